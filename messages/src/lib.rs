//! Wire codec for node-to-node frames.
//!
//! Every message travels as a length-delimited frame with a hand-encoded,
//! bit-exact header (flags, optional fragment fields, id, sender, optional
//! addressee, kind, round) followed by a kind-specific payload. Payload
//! bodies are bincode-encoded serde structs; large payloads are LZ4
//! compressed under the `Compressed` flag.

pub mod assembler;
pub mod codec;
pub mod error;
pub mod flags;
pub mod frame;
pub mod kind;

pub use assembler::FragmentAssembler;
pub use codec::{decode_payload, encode_payload};
pub use error::CodecError;
pub use frame::{Frame, FragmentInfo, MAX_FRAGMENTS, MAX_FRAGMENT_SIZE};
pub use kind::MessageKind;
