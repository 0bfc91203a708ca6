use conclave_types::{PublicKey, WalletId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction id {inner_id} from {wallet} rejected by replay window")]
    ReplayRejected { wallet: PublicKey, inner_id: i64 },

    #[error("amount arithmetic overflow applying transaction id {inner_id}")]
    AmountOverflow { inner_id: i64 },

    #[error("unknown compact wallet id {0}")]
    UnknownWalletId(WalletId),

    #[error("packet hash mismatch")]
    PacketHashMismatch,
}
