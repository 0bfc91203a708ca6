//! Ledger data model and per-wallet state.
//!
//! Defines the on-chain structures (transactions, content-addressed
//! transaction packets, blocks with their prefix-hashing rules) and the
//! wallet-side state updated during block application: balances, the
//! replay-protection tail, and the per-wallet block-hash history.

pub mod block;
mod bytes;
pub mod error;
pub mod ids;
pub mod packet;
pub mod pools;
pub mod tail;
pub mod transaction;
pub mod wallets;

pub use block::{Block, SmartSignature};
pub use error::LedgerError;
pub use ids::WalletsIds;
pub use packet::TransactionsPacket;
pub use pools::{PoolHashData, WalletsPools};
pub use tail::TransactionsTail;
pub use transaction::Transaction;
pub use wallets::{WalletData, WalletsCache};
