use conclave_types::Sequence;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sequence {0} not found")]
    NotFound(Sequence),

    #[error("store is corrupt: {0}")]
    Corrupt(String),
}
