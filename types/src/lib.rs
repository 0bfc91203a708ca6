//! Fundamental types for the conclave protocol.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: keys, hashes, addresses, amounts, round/sequence counters,
//! user fields, and consensus parameters.

pub mod address;
pub mod amount;
pub mod hash;
pub mod keys;
pub mod params;
pub mod round;
pub mod user_field;

pub use address::{Address, WalletId};
pub use amount::Amount;
pub use hash::Hash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use params::{ConsensusParams, MAX_CONFIDANTS, MIN_CONFIDANTS};
pub use round::{RoundNumber, Sequence};
pub use user_field::{UserField, UserFields, NEW_STATE_FIELD, TIMESTAMP_FIELD};
