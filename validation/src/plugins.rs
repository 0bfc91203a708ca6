//! The standard validator plugins, in their pipeline order.

use crate::{ValidationContext, ValidationOutcome, ValidationPlugin};
use conclave_crypto::verify_signature;
use conclave_ledger::{Block, Transaction, TransactionsPacket};
use conclave_types::{user_field::timestamp_of, Address, PublicKey, MAX_CONFIDANTS};
use tracing::{error, warn};

/// The pipeline in declared order.
pub fn default_plugins() -> Vec<Box<dyn ValidationPlugin>> {
    vec![
        Box::new(HashValidator),
        Box::new(BlockNumValidator),
        Box::new(TimestampValidator),
        Box::new(BlockSignaturesValidator),
        Box::new(SmartSourceSignaturesValidator),
        Box::new(BalanceChecker),
        Box::new(TransactionsChecker),
    ]
}

/// Chain linkage: the block must reference the previous block's prefix
/// hash. A mismatch is a broken chain and therefore fatal.
pub struct HashValidator;

impl ValidationPlugin for HashValidator {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn validate(&self, block: &Block, ctx: &ValidationContext) -> ValidationOutcome {
        let counted = ctx.prev_block.hash();
        if block.previous_hash != counted {
            error!(
                fatal = true,
                sequence = block.sequence,
                prev_sequence = ctx.prev_block.sequence,
                "previous hash does not match the real previous block hash"
            );
            return ValidationOutcome::Fatal;
        }
        ValidationOutcome::NoError
    }
}

/// Sequence continuity: exactly one step past the previous block.
pub struct BlockNumValidator;

impl ValidationPlugin for BlockNumValidator {
    fn name(&self) -> &'static str {
        "block-num"
    }

    fn validate(&self, block: &Block, ctx: &ValidationContext) -> ValidationOutcome {
        if block.sequence.wrapping_sub(ctx.prev_block.sequence) != 1 {
            error!(
                sequence = block.sequence,
                prev_sequence = ctx.prev_block.sequence,
                "block sequence is not previous + 1"
            );
            return ValidationOutcome::Error;
        }
        ValidationOutcome::NoError
    }
}

/// Timestamps must exist and must not regress. Violations warn only.
pub struct TimestampValidator;

impl ValidationPlugin for TimestampValidator {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn validate(&self, block: &Block, ctx: &ValidationContext) -> ValidationOutcome {
        let Some(prev_ts) = timestamp_of(&ctx.prev_block.user_fields) else {
            warn!(
                sequence = ctx.prev_block.sequence,
                "previous block has no timestamp"
            );
            return ValidationOutcome::Warning;
        };
        let Some(curr_ts) = timestamp_of(&block.user_fields) else {
            warn!(sequence = block.sequence, "block has no timestamp");
            return ValidationOutcome::Warning;
        };
        if curr_ts < prev_ts {
            warn!(
                sequence = block.sequence,
                curr_ts, prev_ts, "block timestamp is behind its predecessor"
            );
            return ValidationOutcome::Warning;
        }
        ValidationOutcome::NoError
    }
}

/// Signature quorum: the trusted-mask popcount must equal the signature
/// count, the confidant set must fit the mask, and every asserted bit must
/// verify against the block's prefix digest.
pub struct BlockSignaturesValidator;

impl ValidationPlugin for BlockSignaturesValidator {
    fn name(&self) -> &'static str {
        "block-signatures"
    }

    fn validate(&self, block: &Block, _ctx: &ValidationContext) -> ValidationOutcome {
        let real_trusted = block.real_trusted_mask.count_ones() as usize;
        if block.signatures.len() != real_trusted {
            error!(
                sequence = block.sequence,
                signatures = block.signatures.len(),
                real_trusted,
                "signature count does not match trusted mask"
            );
            return ValidationOutcome::Error;
        }
        if block.confidants.len() > MAX_CONFIDANTS {
            error!(
                sequence = block.sequence,
                confidants = block.confidants.len(),
                "more confidants than trusted-mask bits"
            );
            return ValidationOutcome::Error;
        }

        let digest = block.hash();
        let mut checking = 0usize;
        for (index, confidant) in block.confidants.iter().enumerate() {
            if block.real_trusted_mask & (1u64 << index) == 0 {
                continue;
            }
            let Some(signature) = block.signatures.get(checking) else {
                error!(sequence = block.sequence, "trusted mask outruns signatures");
                return ValidationOutcome::Error;
            };
            if !verify_signature(digest.as_bytes(), signature, confidant) {
                error!(
                    sequence = block.sequence,
                    confidant = index,
                    "invalid block signature"
                );
                return ValidationOutcome::Error;
            }
            checking += 1;
        }
        ValidationOutcome::NoError
    }
}

/// Group signatures over contract new-state packets.
///
/// A block carrying new-state transactions must carry one smart signature
/// group per distinct source; each group's indices must point into the
/// consensus pool's confidant set and each signature must verify against
/// the packet hash.
pub struct SmartSourceSignaturesValidator;

impl SmartSourceSignaturesValidator {
    fn resolve_source(tx: &Transaction, ctx: &ValidationContext) -> Option<PublicKey> {
        match &tx.source {
            Address::Key(key) => Some(*key),
            Address::Id(id) => ctx
                .wallets
                .and_then(|wallets| wallets.ids().lookup_id(*id))
                .copied(),
        }
    }

    /// One packet per new-state transaction source: the new-state entry
    /// plus every later transaction from the same source.
    fn grep_new_state_packs(block: &Block) -> Vec<TransactionsPacket> {
        let mut packs = Vec::new();
        for (i, tx) in block.transactions.iter().enumerate() {
            if !tx.is_new_state() {
                continue;
            }
            let mut transactions = vec![tx.clone()];
            for later in &block.transactions[i + 1..] {
                if later.source == tx.source {
                    transactions.push(later.clone());
                }
            }
            packs.push(TransactionsPacket::new(transactions));
        }
        packs
    }
}

impl ValidationPlugin for SmartSourceSignaturesValidator {
    fn name(&self) -> &'static str {
        "smart-source-signatures"
    }

    fn validate(&self, block: &Block, ctx: &ValidationContext) -> ValidationOutcome {
        if block.smart_signatures.is_empty() {
            if block.contains_new_state() {
                error!(
                    sequence = block.sequence,
                    "block contains new state but no smart signatures"
                );
                return ValidationOutcome::Error;
            }
            return ValidationOutcome::NoError;
        }

        let packs = Self::grep_new_state_packs(block);
        if block.smart_signatures.len() != packs.len() {
            error!(
                sequence = block.sequence,
                groups = block.smart_signatures.len(),
                packs = packs.len(),
                "smart signature group count does not match new-state packets"
            );
            return ValidationOutcome::Error;
        }

        for pack in &packs {
            let Some(source_key) = pack
                .transactions
                .first()
                .and_then(|tx| Self::resolve_source(tx, ctx))
            else {
                error!(sequence = block.sequence, "unresolvable new-state source");
                return ValidationOutcome::Error;
            };

            let Some(group) = block
                .smart_signatures
                .iter()
                .find(|group| group.smart_key == source_key)
            else {
                error!(
                    sequence = block.sequence,
                    source = %source_key,
                    "no smart signatures for new-state source"
                );
                return ValidationOutcome::Error;
            };

            let Some(init_pool) = ctx.store.load(group.smart_consensus_pool) else {
                error!(
                    sequence = block.sequence,
                    pool = group.smart_consensus_pool,
                    "smart consensus pool is not in storage"
                );
                return ValidationOutcome::Error;
            };

            for (index, signature) in &group.signatures {
                let Some(confidant) = init_pool.confidants.get(*index as usize) else {
                    error!(
                        sequence = block.sequence,
                        index = *index,
                        pool = group.smart_consensus_pool,
                        "no confidant with that index in the consensus pool"
                    );
                    return ValidationOutcome::Error;
                };
                if !verify_signature(pack.hash.as_bytes(), signature, confidant) {
                    error!(
                        sequence = block.sequence,
                        source = %source_key,
                        index = *index,
                        "incorrect smart-source signature"
                    );
                    return ValidationOutcome::Error;
                }
            }
        }
        ValidationOutcome::NoError
    }
}

/// Reserved hook: balance consistency across the previous block.
pub struct BalanceChecker;

impl ValidationPlugin for BalanceChecker {
    fn name(&self) -> &'static str {
        "balance"
    }

    fn validate(&self, _block: &Block, _ctx: &ValidationContext) -> ValidationOutcome {
        ValidationOutcome::NoError
    }
}

/// Reserved hook: per-transaction checks at block level.
pub struct TransactionsChecker;

impl ValidationPlugin for TransactionsChecker {
    fn name(&self) -> &'static str {
        "transactions"
    }

    fn validate(&self, _block: &Block, _ctx: &ValidationContext) -> ValidationOutcome {
        ValidationOutcome::NoError
    }
}
