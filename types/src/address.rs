//! Wallet addresses — either a full public key or a compact local id.
//!
//! The compact form is a node-local optimisation: every node keeps a
//! bijective mapping between the public keys it has seen and small
//! integer ids (see `conclave_ledger::WalletsIds`). Only the key form is
//! meaningful across the network.

use crate::keys::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node-local compact wallet identifier.
pub type WalletId = u32;

/// A wallet address in either of its two representations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Address {
    /// Full 32-byte public key.
    Key(PublicKey),
    /// Compact node-local id.
    Id(WalletId),
}

impl Address {
    pub fn as_key(&self) -> Option<&PublicKey> {
        match self {
            Address::Key(k) => Some(k),
            Address::Id(_) => None,
        }
    }

    pub fn as_id(&self) -> Option<WalletId> {
        match self {
            Address::Key(_) => None,
            Address::Id(id) => Some(*id),
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Address::Key(_))
    }
}

impl From<PublicKey> for Address {
    fn from(key: PublicKey) -> Self {
        Address::Key(key)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Key(k) => write!(f, "{k}"),
            Address::Id(id) => write!(f, "#{id}"),
        }
    }
}
