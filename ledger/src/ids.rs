//! Bijective mapping between public keys and compact wallet ids.
//!
//! Ids are node-local: they are assigned in first-seen order and never
//! reused, so the mapping is a bijection for the lifetime of the node.

use conclave_types::{Address, PublicKey, WalletId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct WalletsIds {
    by_key: HashMap<PublicKey, WalletId>,
    by_id: Vec<PublicKey>,
}

impl WalletsIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or assign the compact id for a key.
    pub fn get_or_assign(&mut self, key: PublicKey) -> WalletId {
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let id = self.by_id.len() as WalletId;
        self.by_id.push(key);
        self.by_key.insert(key, id);
        id
    }

    pub fn lookup_key(&self, key: &PublicKey) -> Option<WalletId> {
        self.by_key.get(key).copied()
    }

    pub fn lookup_id(&self, id: WalletId) -> Option<&PublicKey> {
        self.by_id.get(id as usize)
    }

    /// Resolve either address form to its public key.
    pub fn resolve(&self, address: &Address) -> Option<PublicKey> {
        match address {
            Address::Key(key) => Some(*key),
            Address::Id(id) => self.lookup_id(*id).copied(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
