//! Conclave full node — wires the core subsystems together.
//!
//! The node owns one logical message-processing loop: framed messages
//! arrive from the transport, pass the round-policy router, and become
//! events for the consensus state machine or inputs for the pool
//! synchronizer and packet conveyer. Block acceptance runs the validator
//! pipeline, then storage, then the wallet applier. Round boundaries
//! trigger synchronizer re-evaluation.

pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod node;
pub mod pool_synchronizer;
pub mod router;
pub mod transport;

pub use config::NodeConfig;
pub use error::NodeError;
pub use keys::{ensure_keys, PromptAnswer};
pub use node::{BlockReplyPayload, BlockRequestPayload, CharacteristicPayload, CoreNode};
pub use pool_synchronizer::{PoolSynchronizer, SyncAction, SyncConfig};
pub use router::{choose_action, MessageAction, PostponedQueue};
pub use transport::{LoopbackTransport, NeighborInfo, Transport};
