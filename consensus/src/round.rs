//! Round tables, roles, and per-round state.

use crate::error::ConsensusError;
use crate::stage::{StageOne, StageThree, StageTwo};
use conclave_types::{Hash, PublicKey, RoundNumber, MAX_CONFIDANTS, MIN_CONFIDANTS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node's role within the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Observer: accepts blocks, takes no part in the stages.
    Normal,
    /// Member of the round's trusted set.
    Confidant,
    /// The round's general (proposer).
    Main,
    /// The confidant designated to publish the round's block.
    Writer,
}

/// The announcement that opens a round: proposer, trusted set, and the
/// packet hashes the round will vote on. Immutable for the round's
/// lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundTable {
    pub round: RoundNumber,
    pub general: PublicKey,
    pub confidants: Vec<PublicKey>,
    pub hashes: Vec<Hash>,
}

impl RoundTable {
    /// Reject tables whose confidant count is outside protocol bounds.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.confidants.len() < MIN_CONFIDANTS {
            return Err(ConsensusError::BadRoundTable("too few confidants"));
        }
        if self.confidants.len() > MAX_CONFIDANTS {
            return Err(ConsensusError::BadRoundTable("too many confidants"));
        }
        Ok(())
    }
}

/// Per-round mutable state: the installed table, this node's role, and the
/// stage evidence accumulated so far. Exclusively owned by the consensus
/// subsystem; the validator and synchronizer see read-only views.
#[derive(Debug)]
pub struct RoundState {
    pub current_round: RoundNumber,
    pub general: PublicKey,
    pub confidants: Vec<PublicKey>,
    pub role: Role,
    pub my_conf_index: Option<u8>,
    pub stage1: Vec<Option<StageOne>>,
    pub stage2: Vec<Option<StageTwo>>,
    pub stage3: Vec<Option<StageThree>>,
    /// Block-hash confirmations collected by the writer.
    pub hashes: HashMap<PublicKey, Hash>,
    /// Packet hashes declared by the round table.
    pub declared_hashes: Vec<Hash>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            current_round: 0,
            general: PublicKey::ZERO,
            confidants: Vec::new(),
            role: Role::Normal,
            my_conf_index: None,
            stage1: Vec::new(),
            stage2: Vec::new(),
            stage3: Vec::new(),
            hashes: HashMap::new(),
            declared_hashes: Vec::new(),
        }
    }
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a round table: set the round, recompute this node's role,
    /// and clear every per-round accumulator.
    pub fn install(&mut self, table: RoundTable, my_key: &PublicKey) {
        let confidant_count = table.confidants.len();
        self.current_round = table.round;
        self.general = table.general;
        self.my_conf_index = table
            .confidants
            .iter()
            .position(|key| key == my_key)
            .map(|idx| idx as u8);
        self.role = if table.general == *my_key {
            Role::Main
        } else if self.my_conf_index.is_some() {
            Role::Confidant
        } else {
            Role::Normal
        };
        self.confidants = table.confidants;
        self.declared_hashes = table.hashes;

        self.stage1 = vec![None; confidant_count];
        self.stage2 = vec![None; confidant_count];
        self.stage3 = vec![None; confidant_count];
        self.hashes.clear();
    }

    /// Reset to a bare round number (BigBang path): no table, no role.
    pub fn reset(&mut self, round: RoundNumber) {
        *self = Self::default();
        self.current_round = round;
    }

    pub fn cnt_trusted(&self) -> usize {
        self.confidants.len()
    }

    pub fn is_confidant(&self) -> bool {
        self.my_conf_index.is_some()
    }

    pub fn stage1_count(&self) -> usize {
        self.stage1.iter().flatten().count()
    }

    pub fn stage2_count(&self) -> usize {
        self.stage2.iter().flatten().count()
    }

    pub fn stage3_count(&self) -> usize {
        self.stage3.iter().flatten().count()
    }

    /// Indices of confidants whose stage of the given slot is missing.
    pub fn missing_in<T>(slots: &[Option<T>]) -> Vec<u8> {
        slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(idx, _)| idx as u8)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PublicKey {
        PublicKey([byte; 32])
    }

    fn table(round: RoundNumber, general: u8, confidants: &[u8]) -> RoundTable {
        RoundTable {
            round,
            general: key(general),
            confidants: confidants.iter().map(|b| key(*b)).collect(),
            hashes: Vec::new(),
        }
    }

    #[test]
    fn confidant_bounds_enforced() {
        assert!(table(1, 0, &[1, 2]).validate().is_err());
        assert!(table(1, 0, &[1, 2, 3]).validate().is_ok());

        let big: Vec<u8> = (0..65).collect();
        assert!(table(1, 0, &big).validate().is_err());
    }

    #[test]
    fn role_is_a_function_of_keys() {
        let mut state = RoundState::new();

        state.install(table(5, 9, &[1, 2, 3]), &key(9));
        assert_eq!(state.role, Role::Main);

        state.install(table(6, 9, &[1, 2, 3]), &key(2));
        assert_eq!(state.role, Role::Confidant);
        assert_eq!(state.my_conf_index, Some(1));

        state.install(table(7, 9, &[1, 2, 3]), &key(50));
        assert_eq!(state.role, Role::Normal);
        assert_eq!(state.my_conf_index, None);
    }

    #[test]
    fn install_clears_accumulators() {
        let mut state = RoundState::new();
        state.install(table(5, 9, &[1, 2, 3]), &key(2));
        state.hashes.insert(key(1), Hash::new([1u8; 32]));
        state.stage1[0] = Some(crate::stage::StageOne {
            sender: 0,
            candidate_hash: Hash::ZERO,
            signature: conclave_types::Signature([0u8; 64]),
        });

        state.install(table(6, 9, &[1, 2, 3, 4]), &key(2));
        assert_eq!(state.current_round, 6);
        assert_eq!(state.stage1.len(), 4);
        assert_eq!(state.stage1_count(), 0);
        assert!(state.hashes.is_empty());
    }

    #[test]
    fn reset_drops_everything_but_round() {
        let mut state = RoundState::new();
        state.install(table(5, 9, &[1, 2, 3]), &key(2));
        state.reset(15);

        assert_eq!(state.current_round, 15);
        assert_eq!(state.role, Role::Normal);
        assert!(state.confidants.is_empty());
        assert_eq!(state.stage1.len(), 0);
    }

    #[test]
    fn missing_slots_reported() {
        let slots: Vec<Option<u8>> = vec![Some(1), None, Some(3), None];
        assert_eq!(RoundState::missing_in(&slots), vec![1, 3]);
    }
}
