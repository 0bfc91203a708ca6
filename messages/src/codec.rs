//! Payload serialization and LZ4 compression helpers.

use crate::error::CodecError;
use lz4_flex::block::{compress_prepend_size, decompress_size_prepended};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a payload body with bincode.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// Deserialize a payload body with bincode.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
}

/// LZ4-compress a payload. The uncompressed size is prepended so the
/// receiver can bound its destination buffer before inflating.
pub fn compress(data: &[u8]) -> Vec<u8> {
    compress_prepend_size(data)
}

/// Inflate an LZ4 payload, rejecting anything whose declared size exceeds
/// `max_size`.
pub fn decompress(data: &[u8], max_size: usize) -> Result<Vec<u8>, CodecError> {
    if data.len() < 4 {
        return Err(CodecError::Truncated {
            need: 4,
            have: data.len(),
        });
    }
    let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if declared > max_size {
        return Err(CodecError::PayloadTooLarge {
            size: declared,
            max: max_size,
        });
    }
    decompress_size_prepended(data).map_err(|_| CodecError::Decompress)
}
