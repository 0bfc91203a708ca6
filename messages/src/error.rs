use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    #[error("inconsistent fragment header: id {fragment_id} of {fragments_num}")]
    BadFragment { fragment_id: u16, fragments_num: u16 },

    #[error("payload too large: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("LZ4 decompression failed")]
    Decompress,

    #[error("payload serialization failed: {0}")]
    Serialize(String),

    #[error("payload deserialization failed: {0}")]
    Deserialize(String),
}
