use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] conclave_ledger::LedgerError),

    #[error("codec error: {0}")]
    Codec(#[from] conclave_messages::CodecError),

    #[error("consensus error: {0}")]
    Consensus(#[from] conclave_consensus::ConsensusError),

    #[error("key file error: {0}")]
    Keyfile(#[from] conclave_crypto::KeyfileError),

    #[error("config error: {0}")]
    Config(String),

    #[error("no usable node keys and the operator declined generation")]
    KeysUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
