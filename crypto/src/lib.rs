//! Cryptographic primitives for the conclave protocol.
//!
//! - **Ed25519** for signing and signature verification
//! - **Blake2b-256** for hashing (blocks, packets, wire frames)
//! - Base58 key-file encoding for node identity on disk

pub mod hash;
pub mod keyfile;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, hash_data};
pub use keyfile::{read_keys, write_keys, KeyfileError, KeyfileStatus};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private, validate_keypair};
pub use sign::{sign_message, verify_signature};
