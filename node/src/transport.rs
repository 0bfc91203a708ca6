//! The transport surface the core consumes.
//!
//! The real network layer lives outside the core: it delivers reassembled
//! frames into the node's inbound queue and exposes the neighbor set
//! through this trait. A loopback implementation ships for standalone
//! runs and tests.

use conclave_messages::Frame;
use conclave_types::{PublicKey, Sequence};

/// A connected peer as the synchronizer sees it.
#[derive(Clone, Debug)]
pub struct NeighborInfo {
    pub key: PublicKey,
    /// Signal servers relay traffic but hold no chain; the synchronizer
    /// never requests blocks from them.
    pub is_signal: bool,
    /// Last chain sequence the peer advertised (0 = unknown).
    pub last_sequence: Sequence,
}

/// Outbound side of the transport.
pub trait Transport: Send + Sync {
    /// Send a frame to one peer.
    fn send(&self, frame: Frame, to: &PublicKey);

    /// Flood a frame to the neighborhood.
    fn broadcast(&self, frame: Frame);

    /// Number of connected neighbors, signal servers included.
    fn neighbor_count(&self) -> usize;

    /// Number of neighbors that are not signal servers.
    fn neighbor_count_without_ss(&self) -> usize {
        (0..self.neighbor_count())
            .filter_map(|i| self.neighbor_by_index(i as u8))
            .filter(|info| !info.is_signal)
            .count()
    }

    fn neighbor_by_index(&self, index: u8) -> Option<NeighborInfo>;

    /// Drop queued per-round send tasks (called at round boundaries).
    fn clear_tasks(&self);
}

/// A transport with no peers: sends vanish, the neighbor set is empty.
/// Lets a node run standalone (single-node dev chain).
pub struct LoopbackTransport;

impl Transport for LoopbackTransport {
    fn send(&self, _frame: Frame, _to: &PublicKey) {}

    fn broadcast(&self, _frame: Frame) {}

    fn neighbor_count(&self) -> usize {
        0
    }

    fn neighbor_by_index(&self, _index: u8) -> Option<NeighborInfo> {
        None
    }

    fn clear_tasks(&self) {}
}
