//! Consensus parameters shared by every node on a deployment.

use serde::{Deserialize, Serialize};

/// Minimum number of confidants a round table may declare.
pub const MIN_CONFIDANTS: usize = 3;

/// Hard cap on the confidant set, bounded by the 64-bit trusted mask.
pub const MAX_CONFIDANTS: usize = 64;

/// Tunable consensus timing and sizing parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Deployment cap on confidants per round (≤ [`MAX_CONFIDANTS`]).
    pub max_confidants: usize,

    /// One-shot timeout armed when a state is entered; if it fires before
    /// the state transitions, the state's expiry hook runs.
    pub default_state_timeout_ms: u64,

    /// Base delay a waiting confidant multiplies by its writing-queue
    /// number before assuming the round has stalled.
    pub post_consensus_timeout_ms: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            max_confidants: 5,
            default_state_timeout_ms: 5_000,
            post_consensus_timeout_ms: 2_000,
        }
    }
}
