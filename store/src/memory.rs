//! In-memory block store.

use crate::block::BlockStore;
use conclave_ledger::Block;
use conclave_types::{Hash, Sequence};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Straightforward in-memory backend: a vector of written blocks indexed by
/// sequence plus an ordered buffer of out-of-order arrivals.
#[derive(Default)]
pub struct MemoryBlockStore {
    written: Vec<Block>,
    cached: BTreeMap<Sequence, Block>,
    global: Sequence,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been written yet (not even genesis).
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    fn write_at_head(&mut self, block: Block, by_sync: bool) {
        info!(
            sequence = block.sequence,
            transactions = block.transactions_count(),
            by_sync,
            "block written"
        );
        self.note_global_sequence(block.sequence);
        self.written.push(block);
    }
}

impl BlockStore for MemoryBlockStore {
    fn store_block(&mut self, block: Block, by_sync: bool) -> bool {
        let sequence = block.sequence;
        let next = if self.written.is_empty() {
            0
        } else {
            self.last_written_sequence() + 1
        };

        if sequence == next {
            if let Some(head) = self.written.last() {
                if block.previous_hash != head.hash() {
                    warn!(sequence, "rejecting block that does not link to the head");
                    return false;
                }
            }
            self.write_at_head(block, by_sync);
            return true;
        }

        if sequence > next {
            debug!(sequence, head = next, "caching out-of-order block");
            self.note_global_sequence(sequence);
            self.cached.insert(sequence, block);
            return false;
        }

        debug!(sequence, "discarding block at or below the written head");
        false
    }

    fn test_cached_blocks(&mut self) -> usize {
        let mut drained = 0;
        loop {
            let next = if self.written.is_empty() {
                0
            } else {
                self.last_written_sequence() + 1
            };
            // Cached entries at or below the head are stale duplicates.
            while let Some((&seq, _)) = self.cached.first_key_value() {
                if seq < next {
                    self.cached.pop_first();
                } else {
                    break;
                }
            }
            match self.cached.first_key_value() {
                Some((&seq, block)) if seq == next => {
                    // Cached blocks skipped full validation on arrival;
                    // check the chain link before writing.
                    if let Some(head) = self.written.last() {
                        if block.previous_hash != head.hash() {
                            debug!(sequence = seq, "discarding cached block with broken link");
                            self.cached.pop_first();
                            continue;
                        }
                    }
                    if let Some((_, block)) = self.cached.pop_first() {
                        self.write_at_head(block, true);
                        drained += 1;
                    }
                }
                _ => break,
            }
        }
        drained
    }

    fn last_written_sequence(&self) -> Sequence {
        self.written.last().map_or(0, |b| b.sequence)
    }

    fn cached_blocks_size(&self) -> usize {
        self.cached.len()
    }

    fn required_ranges(&self) -> Vec<(Sequence, Sequence)> {
        let mut ranges = Vec::new();
        let mut lo = if self.written.is_empty() {
            0
        } else {
            self.last_written_sequence() + 1
        };

        for &seq in self.cached.keys() {
            if seq > lo {
                ranges.push((lo, seq - 1));
            }
            lo = lo.max(seq + 1);
        }
        ranges.push((lo, 0));
        ranges
    }

    fn load(&self, sequence: Sequence) -> Option<Block> {
        self.written.get(sequence as usize).cloned()
    }

    fn hash_by_sequence(&self, sequence: Sequence) -> Option<Hash> {
        self.written.get(sequence as usize).map(Block::hash)
    }

    fn global_sequence(&self) -> Sequence {
        self.global
    }

    fn note_global_sequence(&mut self, sequence: Sequence) {
        if sequence > self.global {
            self.global = sequence;
        }
    }
}
