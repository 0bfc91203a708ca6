//! Conclave daemon — entry point for running a conclave node.

use clap::Parser;
use conclave_ledger::Block;
use conclave_node::keys::{ensure_keys, stdin_prompt};
use conclave_node::logging::{init_logging, LogFormat};
use conclave_node::{CoreNode, LoopbackTransport, NodeConfig};
use conclave_store::MemoryBlockStore;
use conclave_types::{Hash, UserField, UserFields, TIMESTAMP_FIELD};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "conclave-daemon", about = "Conclave ledger node daemon")]
struct Cli {
    /// Data directory.
    #[arg(long, default_value = "./conclave_data", env = "CONCLAVE_DATA_DIR")]
    data_dir: PathBuf,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "CONCLAVE_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "CONCLAVE_LOG_FORMAT")]
    log_format: String,

    /// Answer the key-generation prompt with "g" without asking.
    #[arg(long, env = "CONCLAVE_GENERATE_KEYS")]
    generate_keys: bool,

    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the node.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config: Option<NodeConfig> = match &cli.config {
        Some(path) => match NodeConfig::from_toml_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Failed to load config file {}: {e}", path.display());
                None
            }
        },
        None => None,
    };

    let config = {
        let mut config = file_config.unwrap_or_default();
        config.data_dir = cli.data_dir;
        config.log_level = cli.log_level;
        config.log_format = cli.log_format;
        config
    };

    let format = match config.log_format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Human,
    };
    init_logging(format, &config.log_level);

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Run => run_node(config, cli.generate_keys).await?,
        },
    }

    Ok(())
}

async fn run_node(config: NodeConfig, generate_keys: bool) -> anyhow::Result<()> {
    let keypair = if generate_keys {
        ensure_keys(&config, |_| conclave_node::keys::PromptAnswer::Generate)?
    } else {
        ensure_keys(&config, stdin_prompt)?
    };

    tracing::info!(key = %keypair.public, "starting conclave node");

    let mut fields = UserFields::new();
    fields.insert(
        TIMESTAMP_FIELD,
        UserField::Text(chain_epoch_ms().to_string()),
    );
    let genesis = Block::build(0, Hash::ZERO, vec![keypair.public], Vec::new(), fields);
    tracing::info!(hash = %genesis.hash(), "writing genesis block");

    let store = MemoryBlockStore::new();
    let mut node = CoreNode::new(
        &config,
        keypair,
        Box::new(store),
        Arc::new(LoopbackTransport),
    );
    node.bootstrap_genesis(genesis);
    drive(node).await;

    tracing::info!("conclave daemon exited cleanly");
    Ok(())
}

async fn drive(mut node: CoreNode) {
    // The transport layer feeds this channel in a networked deployment;
    // standalone runs just idle until interrupted.
    let (tx, rx) = tokio::sync::mpsc::channel(1024);

    tokio::select! {
        _ = node.run(rx) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, stopping node");
        }
    }
    drop(tx);
}

fn chain_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
