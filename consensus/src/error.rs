use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("round table rejected: {0}")]
    BadRoundTable(&'static str),

    #[error("stage rejected from confidant {sender}: {reason}")]
    BadStage { sender: u8, reason: &'static str },

    #[error("packet hash mismatch")]
    PacketHashMismatch,

    #[error("node keys are unusable for signing")]
    SigningFailed,
}
