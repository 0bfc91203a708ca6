//! The three signed stage messages of one consensus round.
//!
//! Stage one declares a confidant's candidate packet hash, stage two
//! echoes the first-stage signatures it collected, stage three commits to
//! a writer and the writing-queue order. Every stage is signed by its
//! sending confidant over the stage content plus the round number, so
//! stages cannot be replayed across rounds.

use conclave_crypto::{sign_message, verify_signature};
use conclave_types::{Hash, KeyPair, PublicKey, RoundNumber, Signature};
use serde::{Deserialize, Serialize};

/// Queue-number value marking a confidant that is not writing this round.
pub const INVALID_ORDER: u8 = u8::MAX;

/// Which of the three stages a request or reply concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    First,
    Second,
    Third,
}

/// Candidate declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageOne {
    /// Sender's index into the round's confidant vector.
    pub sender: u8,
    /// Hash over the packet set the sender proposes for the round.
    pub candidate_hash: Hash,
    pub signature: Signature,
}

/// Echo of collected first-stage evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageTwo {
    pub sender: u8,
    /// First-stage signatures by confidant index; zeroed where missing.
    pub signatures: Vec<Signature>,
    pub signature: Signature,
}

/// Commit: the designated writer and the writing-queue numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageThree {
    pub sender: u8,
    /// Index of the confidant designated to publish the block.
    pub writer: u8,
    /// Writing-queue number per confidant index ([`INVALID_ORDER`] for
    /// confidants excluded from the queue).
    pub real_trusted: Vec<u8>,
    pub signature: Signature,
}

fn stage1_bytes(round: RoundNumber, sender: u8, candidate_hash: &Hash) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(1u8);
    out.extend_from_slice(&round.to_le_bytes());
    out.push(sender);
    out.extend_from_slice(candidate_hash.as_bytes());
    out
}

fn stage2_bytes(round: RoundNumber, sender: u8, signatures: &[Signature]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + signatures.len() * 64);
    out.push(2u8);
    out.extend_from_slice(&round.to_le_bytes());
    out.push(sender);
    for sig in signatures {
        out.extend_from_slice(sig.as_bytes());
    }
    out
}

fn stage3_bytes(round: RoundNumber, sender: u8, writer: u8, real_trusted: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + real_trusted.len());
    out.push(3u8);
    out.extend_from_slice(&round.to_le_bytes());
    out.push(sender);
    out.push(writer);
    out.extend_from_slice(real_trusted);
    out
}

impl StageOne {
    pub fn sign(
        round: RoundNumber,
        sender: u8,
        candidate_hash: Hash,
        keypair: &KeyPair,
    ) -> Option<Self> {
        let signature = sign_message(&stage1_bytes(round, sender, &candidate_hash), &keypair.private)?;
        Some(Self {
            sender,
            candidate_hash,
            signature,
        })
    }

    pub fn verify(&self, round: RoundNumber, confidants: &[PublicKey]) -> bool {
        let Some(key) = confidants.get(self.sender as usize) else {
            return false;
        };
        verify_signature(
            &stage1_bytes(round, self.sender, &self.candidate_hash),
            &self.signature,
            key,
        )
    }
}

impl StageTwo {
    pub fn sign(
        round: RoundNumber,
        sender: u8,
        signatures: Vec<Signature>,
        keypair: &KeyPair,
    ) -> Option<Self> {
        let signature = sign_message(&stage2_bytes(round, sender, &signatures), &keypair.private)?;
        Some(Self {
            sender,
            signatures,
            signature,
        })
    }

    pub fn verify(&self, round: RoundNumber, confidants: &[PublicKey]) -> bool {
        let Some(key) = confidants.get(self.sender as usize) else {
            return false;
        };
        verify_signature(
            &stage2_bytes(round, self.sender, &self.signatures),
            &self.signature,
            key,
        )
    }
}

impl StageThree {
    pub fn sign(
        round: RoundNumber,
        sender: u8,
        writer: u8,
        real_trusted: Vec<u8>,
        keypair: &KeyPair,
    ) -> Option<Self> {
        let signature = sign_message(
            &stage3_bytes(round, sender, writer, &real_trusted),
            &keypair.private,
        )?;
        Some(Self {
            sender,
            writer,
            real_trusted,
            signature,
        })
    }

    pub fn verify(&self, round: RoundNumber, confidants: &[PublicKey]) -> bool {
        let Some(key) = confidants.get(self.sender as usize) else {
            return false;
        };
        self.real_trusted.len() == confidants.len()
            && (self.writer as usize) < confidants.len()
            && verify_signature(
                &stage3_bytes(round, self.sender, self.writer, &self.real_trusted),
                &self.signature,
                key,
            )
    }

    /// The writing-queue number stage three assigns to its own sender.
    pub fn own_queue_number(&self) -> u8 {
        self.real_trusted
            .get(self.sender as usize)
            .copied()
            .unwrap_or(INVALID_ORDER)
    }
}
