//! Content-addressed transaction packets exchanged between peers ahead of
//! consensus.

use crate::transaction::Transaction;
use conclave_crypto::hash_data;
use conclave_types::Hash;
use serde::{Deserialize, Serialize};

/// An ordered batch of transactions addressed by the Blake2b digest of
/// their concatenated canonical serializations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionsPacket {
    pub hash: Hash,
    pub transactions: Vec<Transaction>,
}

impl TransactionsPacket {
    /// Build a packet, computing its content hash.
    pub fn new(transactions: Vec<Transaction>) -> Self {
        let hash = Self::compute_hash(&transactions);
        Self { hash, transactions }
    }

    /// Recompute the content hash of a transaction sequence.
    pub fn compute_hash(transactions: &[Transaction]) -> Hash {
        let mut bytes = Vec::new();
        for tx in transactions {
            bytes.extend_from_slice(&tx.canonical_bytes());
        }
        hash_data(&bytes)
    }

    /// Whether the stored hash matches the content.
    pub fn verify_hash(&self) -> bool {
        self.hash == Self::compute_hash(&self.transactions)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
