//! The storage operations the core consumes.

use conclave_ledger::Block;
use conclave_types::{Hash, Sequence};

/// Append-only block storage with a buffer for out-of-order arrivals.
///
/// Blocks land strictly at `last_written_sequence() + 1`; anything ahead of
/// that is held in the cached-block buffer until its predecessor arrives
/// ("cached blocks" in the sync protocol's vocabulary).
pub trait BlockStore: Send {
    /// Offer a block. Returns `true` if it was written at the chain head,
    /// `false` if it was cached for later or discarded as already written.
    /// `by_sync` marks blocks obtained through pool synchronization rather
    /// than live consensus.
    fn store_block(&mut self, block: Block, by_sync: bool) -> bool;

    /// Drain cached blocks that have become contiguous with the head.
    /// Returns how many were written.
    fn test_cached_blocks(&mut self) -> usize;

    /// Sequence of the newest written block. 0 when only genesis exists.
    fn last_written_sequence(&self) -> Sequence;

    /// Number of blocks waiting in the cached-block buffer.
    fn cached_blocks_size(&self) -> usize;

    /// Intervals `[lo, hi]` of sequences still missing, ordered ascending.
    /// The final interval carries `hi = 0` meaning "and everything after".
    fn required_ranges(&self) -> Vec<(Sequence, Sequence)>;

    /// Load a written block by sequence.
    fn load(&self, sequence: Sequence) -> Option<Block>;

    /// Hash of the written block at `sequence`.
    fn hash_by_sequence(&self, sequence: Sequence) -> Option<Hash>;

    /// Highest sequence this store has ever observed, written or cached.
    fn global_sequence(&self) -> Sequence;

    /// Record the highest sequence advertised by the network, so gap
    /// reporting can extend past what has physically arrived.
    fn note_global_sequence(&mut self, sequence: Sequence);

    /// Whether the store is aware of blocks it cannot link yet.
    fn block_request_need(&self) -> bool {
        self.cached_blocks_size() > 0
    }
}
