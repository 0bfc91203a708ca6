//! Per-wallet history of the blocks a wallet appeared in.

use conclave_types::{Hash, WalletId};
use std::collections::HashMap;

/// Most recent block hashes kept per wallet.
pub const MAX_POOL_HASHES: usize = 100;

/// One remembered block appearance: the block hash and how many of the
/// wallet's transactions it carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolHashData {
    pub pool_hash: Hash,
    pub tx_num: u32,
}

/// Fixed-capacity ring buffer: pushing beyond capacity overwrites the
/// oldest entry.
#[derive(Clone, Debug)]
struct CyclicBuffer<T> {
    items: Vec<T>,
    head: usize,
}

impl<T: Clone> CyclicBuffer<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            head: 0,
        }
    }

    fn push(&mut self, item: T, capacity: usize) {
        if self.items.len() < capacity {
            self.items.push(item);
        } else {
            self.items[self.head] = item;
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Entries oldest-first.
    fn iter_ordered(&self) -> impl Iterator<Item = &T> {
        self.items[self.head..]
            .iter()
            .chain(self.items[..self.head].iter())
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Tracks, for every wallet, the last [`MAX_POOL_HASHES`] blocks it
/// appeared in.
#[derive(Debug, Default)]
pub struct WalletsPools {
    histories: HashMap<WalletId, CyclicBuffer<PoolHashData>>,
}

impl WalletsPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a wallet appeared in a block with `tx_num` of its
    /// transactions.
    pub fn record(&mut self, wallet: WalletId, pool_hash: Hash, tx_num: u32) {
        self.histories
            .entry(wallet)
            .or_insert_with(CyclicBuffer::new)
            .push(PoolHashData { pool_hash, tx_num }, MAX_POOL_HASHES);
    }

    /// The wallet's remembered appearances, oldest first.
    pub fn find(&self, wallet: WalletId) -> Option<Vec<PoolHashData>> {
        self.histories
            .get(&wallet)
            .map(|buf| buf.iter_ordered().cloned().collect())
    }

    pub fn history_len(&self, wallet: WalletId) -> usize {
        self.histories.get(&wallet).map_or(0, CyclicBuffer::len)
    }
}
