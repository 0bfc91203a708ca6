//! Node identity bootstrap.
//!
//! Keys live in two Base58 text files. When they are missing or unusable
//! the operator is asked whether to generate a fresh pair (`g`) or quit
//! (`q`); generated keys are written back in the same encoding. The
//! prompt is injected so tests (and the daemon's non-interactive mode)
//! can answer without a terminal.

use crate::{NodeConfig, NodeError};
use conclave_crypto::{generate_keypair, read_keys, write_keys, KeyfileStatus};
use conclave_types::KeyPair;
use tracing::{info, warn};

/// The operator's answer to the generate prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptAnswer {
    Generate,
    Quit,
}

/// Read the key files, prompting for regeneration when they are absent or
/// unusable.
pub fn ensure_keys(
    config: &NodeConfig,
    mut prompt: impl FnMut(&str) -> PromptAnswer,
) -> Result<KeyPair, NodeError> {
    match read_keys(&config.public_key_file, &config.private_key_file)? {
        KeyfileStatus::Loaded(keypair) => {
            info!(key = %keypair.public, "node keys loaded");
            Ok(keypair)
        }
        KeyfileStatus::Missing => {
            warn!("no suitable keys were found");
            generate_if_confirmed(config, prompt("No suitable keys were found."))
        }
        KeyfileStatus::Invalid(reason) => {
            warn!(reason, "key files are unusable");
            generate_if_confirmed(config, prompt(reason))
        }
    }
}

/// Read the operator's answer from stdin: `g` generates, anything else
/// quits.
pub fn stdin_prompt(reason: &str) -> PromptAnswer {
    println!("\n{reason} Type \"g\" to generate or \"q\" to quit.");
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return PromptAnswer::Quit;
    }
    match line.trim() {
        "g" | "G" => PromptAnswer::Generate,
        _ => PromptAnswer::Quit,
    }
}

fn generate_if_confirmed(config: &NodeConfig, answer: PromptAnswer) -> Result<KeyPair, NodeError> {
    match answer {
        PromptAnswer::Generate => {
            let keypair = generate_keypair();
            write_keys(&keypair, &config.public_key_file, &config.private_key_file)?;
            info!(key = %keypair.public, "generated fresh node keys");
            Ok(keypair)
        }
        PromptAnswer::Quit => Err(NodeError::KeysUnavailable),
    }
}
