//! Blocks and their prefix-hashing rules.

use crate::bytes::{
    put_hash, put_key, put_signature, put_u32, put_u64, put_u8, put_user_fields,
};
use crate::transaction::Transaction;
use conclave_crypto::hash_data;
use conclave_types::{Hash, PublicKey, Sequence, Signature, UserFields};
use serde::{Deserialize, Serialize};

/// Group signature over a new-state packet, collected by the consensus
/// round that executed the contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmartSignature {
    /// Source key of the contract whose new state is being signed.
    pub smart_key: PublicKey,
    /// Sequence of the block whose confidants ran the contract consensus.
    pub smart_consensus_pool: Sequence,
    /// (confidant index into that block's confidants, signature) pairs.
    pub signatures: Vec<(u8, Signature)>,
}

/// A block ("pool"): one round's worth of ordered transactions plus the
/// consensus evidence that produced it.
///
/// The block hash and the confidants' signatures cover only the byte prefix
/// `bytes()[..hashing_length]` — everything up to but excluding the
/// signature tail, so signatures can be attached without changing the
/// signed content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub sequence: Sequence,
    pub previous_hash: Hash,
    pub confidants: Vec<PublicKey>,
    /// Bit i set iff `confidants[i]` signed the hashing prefix.
    pub real_trusted_mask: u64,
    pub transactions: Vec<Transaction>,
    pub user_fields: UserFields,
    /// Length of the hashed/signed prefix of `bytes()`.
    pub hashing_length: u32,
    pub signatures: Vec<Signature>,
    pub smart_signatures: Vec<SmartSignature>,
}

impl Block {
    /// Build an unsealed block with no signatures yet. `seal()` is implied:
    /// the hashing length is set to cover the whole content prefix.
    pub fn build(
        sequence: Sequence,
        previous_hash: Hash,
        confidants: Vec<PublicKey>,
        transactions: Vec<Transaction>,
        user_fields: UserFields,
    ) -> Self {
        let mut block = Self {
            sequence,
            previous_hash,
            confidants,
            real_trusted_mask: 0,
            transactions,
            user_fields,
            hashing_length: 0,
            signatures: Vec::new(),
            smart_signatures: Vec::new(),
        };
        block.hashing_length = block.hashing_bytes().len() as u32;
        block
    }

    /// The canonical content prefix: everything except the signature tail.
    pub fn hashing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        put_u64(&mut out, self.sequence);
        put_hash(&mut out, &self.previous_hash);
        put_u8(&mut out, self.confidants.len() as u8);
        for key in &self.confidants {
            put_key(&mut out, key);
        }
        put_u64(&mut out, self.real_trusted_mask);
        put_u32(&mut out, self.transactions.len() as u32);
        for tx in &self.transactions {
            out.extend_from_slice(&tx.canonical_bytes());
        }
        put_user_fields(&mut out, &self.user_fields);
        out
    }

    /// Full canonical serialization: content prefix followed by the
    /// signature tail.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = self.hashing_bytes();
        put_u8(&mut out, self.signatures.len() as u8);
        for sig in &self.signatures {
            put_signature(&mut out, sig);
        }
        put_u32(&mut out, self.smart_signatures.len() as u32);
        for smart in &self.smart_signatures {
            put_key(&mut out, &smart.smart_key);
            put_u64(&mut out, smart.smart_consensus_pool);
            put_u32(&mut out, smart.signatures.len() as u32);
            for (idx, sig) in &smart.signatures {
                put_u8(&mut out, *idx);
                put_signature(&mut out, sig);
            }
        }
        out
    }

    /// The digest confidants sign and successors reference as
    /// `previous_hash`: Blake2b over `bytes()[..hashing_length]`.
    pub fn hash(&self) -> Hash {
        let bytes = self.bytes();
        let len = (self.hashing_length as usize).min(bytes.len());
        hash_data(&bytes[..len])
    }

    pub fn transactions_count(&self) -> usize {
        self.transactions.len()
    }

    /// Whether any transaction carries a contract new-state record.
    pub fn contains_new_state(&self) -> bool {
        self.transactions.iter().any(Transaction::is_new_state)
    }
}
