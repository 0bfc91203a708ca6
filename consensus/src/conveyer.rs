//! Content-addressed transaction-packet cache ("the conveyer").
//!
//! Packets circulate between peers ahead of consensus; the conveyer is the
//! single place they live, shared between the consensus machine and the
//! sync subsystem. Inserts verify the content hash; duplicates bump a hit
//! counter instead of replacing. At most one fetch per hash may be in
//! flight at a time.

use crate::error::ConsensusError;
use conclave_ledger::TransactionsPacket;
use conclave_types::Hash;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};
use tracing::debug;

const SHARDS: usize = 16;

struct Entry {
    packet: TransactionsPacket,
    hits: u32,
}

/// Sharded content-addressed packet store.
pub struct Conveyer {
    shards: Vec<RwLock<HashMap<Hash, Entry>>>,
    in_flight: Mutex<HashSet<Hash>>,
}

impl Default for Conveyer {
    fn default() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }
}

impl Conveyer {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, hash: &Hash) -> &RwLock<HashMap<Hash, Entry>> {
        &self.shards[hash.as_bytes()[0] as usize % SHARDS]
    }

    /// Insert a packet after recomputing and verifying its hash.
    ///
    /// Returns `true` if the packet is new, `false` if it was already
    /// cached (the existing entry is kept, its hit counter bumped).
    pub fn insert(&self, packet: TransactionsPacket) -> Result<bool, ConsensusError> {
        if !packet.verify_hash() {
            return Err(ConsensusError::PacketHashMismatch);
        }
        let hash = packet.hash;
        self.clear_in_flight(&hash);

        let Ok(mut shard) = self.shard(&hash).write() else {
            return Ok(false);
        };
        if let Some(entry) = shard.get_mut(&hash) {
            entry.hits += 1;
            debug!(%hash, hits = entry.hits, "duplicate packet");
            return Ok(false);
        }
        shard.insert(hash, Entry { packet, hits: 0 });
        Ok(true)
    }

    pub fn get(&self, hash: &Hash) -> Option<TransactionsPacket> {
        self.shard(hash)
            .read()
            .ok()
            .and_then(|shard| shard.get(hash).map(|e| e.packet.clone()))
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.shard(hash)
            .read()
            .map(|shard| shard.contains_key(hash))
            .unwrap_or(false)
    }

    /// Claim the right to fetch a missing packet. Returns `true` exactly
    /// once per hash until the fetch resolves, so only one request can be
    /// outstanding.
    pub fn begin_request(&self, hash: Hash) -> bool {
        if self.contains(&hash) {
            return false;
        }
        match self.in_flight.lock() {
            Ok(mut set) => set.insert(hash),
            Err(_) => false,
        }
    }

    fn clear_in_flight(&self, hash: &Hash) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(hash);
        }
    }

    /// Hashes from `wanted` that are not cached yet.
    pub fn missing_of(&self, wanted: &[Hash]) -> Vec<Hash> {
        wanted
            .iter()
            .filter(|hash| !self.contains(hash))
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().map(|s| s.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
