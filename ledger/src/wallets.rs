//! Per-wallet balances and replay windows, updated during block
//! application.

use crate::block::Block;
use crate::error::LedgerError;
use crate::ids::WalletsIds;
use crate::tail::TransactionsTail;
use conclave_types::{Address, Amount, PublicKey};
use std::collections::HashMap;
use tracing::debug;

/// Balance and replay window of one wallet.
#[derive(Clone, Debug, Default)]
pub struct WalletData {
    pub balance: Amount,
    pub tail: TransactionsTail,
}

/// The wallet store, exclusively owned by the chain applier. Other
/// subsystems read through snapshots taken at round boundaries.
#[derive(Debug, Default)]
pub struct WalletsCache {
    wallets: HashMap<PublicKey, WalletData>,
    ids: WalletsIds,
}

impl WalletsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, key: &PublicKey) -> Option<&WalletData> {
        self.wallets.get(key)
    }

    pub fn ids(&self) -> &WalletsIds {
        &self.ids
    }

    /// Seed a wallet with an opening balance (genesis bootstrap).
    pub fn credit(&mut self, key: PublicKey, amount: Amount) {
        let wallet = self.wallets.entry(key).or_default();
        self.ids.get_or_assign(key);
        wallet.balance = wallet.balance + amount;
    }

    /// Apply an accepted block to wallet state.
    ///
    /// Transactions are walked in block order, source side first: the
    /// replay window must admit the inner id and the debit must not
    /// overflow, then the target is credited and the id pushed. Any
    /// failure rejects the whole block and leaves the cache untouched.
    pub fn apply_block(&mut self, block: &Block) -> Result<(), LedgerError> {
        // Stage changes on copies of the touched wallets so rejection
        // leaves the committed state intact.
        let mut staged: HashMap<PublicKey, WalletData> = HashMap::new();

        for tx in &block.transactions {
            let source = self.resolve(&tx.source)?;
            let target = self.resolve(&tx.target)?;

            let entry = self.staged_entry(&mut staged, source);
            if !entry.tail.is_allowed(tx.inner_id) {
                debug!(wallet = %source, inner_id = tx.inner_id, "replay window rejected transaction");
                return Err(LedgerError::ReplayRejected {
                    wallet: source,
                    inner_id: tx.inner_id,
                });
            }
            let debit = tx
                .amount
                .checked_add(tx.fee)
                .ok_or(LedgerError::AmountOverflow { inner_id: tx.inner_id })?;
            entry.balance = entry
                .balance
                .checked_sub(debit)
                .ok_or(LedgerError::AmountOverflow { inner_id: tx.inner_id })?;
            entry.tail.push(tx.inner_id);

            let entry = self.staged_entry(&mut staged, target);
            entry.balance = entry
                .balance
                .checked_add(tx.amount)
                .ok_or(LedgerError::AmountOverflow { inner_id: tx.inner_id })?;
        }

        for (key, data) in staged {
            self.ids.get_or_assign(key);
            self.wallets.insert(key, data);
        }
        Ok(())
    }

    fn resolve(&self, address: &Address) -> Result<PublicKey, LedgerError> {
        match address {
            Address::Key(key) => Ok(*key),
            Address::Id(id) => self
                .ids
                .lookup_id(*id)
                .copied()
                .ok_or(LedgerError::UnknownWalletId(*id)),
        }
    }

    fn staged_entry<'a>(
        &self,
        staged: &'a mut HashMap<PublicKey, WalletData>,
        key: PublicKey,
    ) -> &'a mut WalletData {
        staged
            .entry(key)
            .or_insert_with(|| self.wallets.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use conclave_types::{Hash, Signature, UserFields};

    fn key(byte: u8) -> PublicKey {
        PublicKey([byte; 32])
    }

    fn tx(inner_id: i64, source: PublicKey, target: PublicKey, amount: i64, fee: i64) -> Transaction {
        Transaction {
            inner_id,
            source: Address::Key(source),
            target: Address::Key(target),
            amount: Amount::from_integral(amount),
            fee: Amount::from_integral(fee),
            signature: Signature([0u8; 64]),
            user_fields: UserFields::new(),
        }
    }

    fn block_of(transactions: Vec<Transaction>) -> Block {
        Block::build(
            1,
            Hash::ZERO,
            vec![key(100), key(101), key(102)],
            transactions,
            UserFields::new(),
        )
    }

    #[test]
    fn transfer_moves_amount_and_burns_fee() {
        let mut cache = WalletsCache::new();
        cache.credit(key(1), Amount::from_integral(100));

        cache
            .apply_block(&block_of(vec![tx(1, key(1), key(2), 30, 1)]))
            .unwrap();

        assert_eq!(
            cache.find(&key(1)).unwrap().balance,
            Amount::from_integral(69)
        );
        assert_eq!(
            cache.find(&key(2)).unwrap().balance,
            Amount::from_integral(30)
        );
    }

    #[test]
    fn replayed_inner_id_rejects_whole_block() {
        let mut cache = WalletsCache::new();
        cache.credit(key(1), Amount::from_integral(100));

        cache
            .apply_block(&block_of(vec![tx(5, key(1), key(2), 10, 0)]))
            .unwrap();
        let balance_after_first = cache.find(&key(1)).unwrap().balance;

        // Second block replays id 5 alongside a fresh transfer; everything
        // must be rolled back.
        let result = cache.apply_block(&block_of(vec![
            tx(6, key(1), key(2), 10, 0),
            tx(5, key(1), key(2), 10, 0),
        ]));
        assert!(matches!(result, Err(LedgerError::ReplayRejected { .. })));
        assert_eq!(cache.find(&key(1)).unwrap().balance, balance_after_first);
        assert!(cache.find(&key(1)).unwrap().tail.is_allowed(6));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut cache = WalletsCache::new();
        cache.credit(key(1), Amount::from_raw(i128::MAX));
        cache.credit(key(2), Amount::from_raw(i128::MAX));

        let result = cache.apply_block(&block_of(vec![tx(1, key(1), key(2), 1, 0)]));
        assert!(matches!(result, Err(LedgerError::AmountOverflow { .. })));
    }

    #[test]
    fn target_wallet_created_on_first_appearance() {
        let mut cache = WalletsCache::new();
        cache.credit(key(1), Amount::from_integral(10));

        assert!(cache.find(&key(9)).is_none());
        cache
            .apply_block(&block_of(vec![tx(1, key(1), key(9), 3, 0)]))
            .unwrap();
        assert_eq!(
            cache.find(&key(9)).unwrap().balance,
            Amount::from_integral(3)
        );
        assert!(cache.ids().lookup_key(&key(9)).is_some());
    }

    #[test]
    fn compact_id_addresses_resolve() {
        let mut cache = WalletsCache::new();
        cache.credit(key(1), Amount::from_integral(10));
        let id = cache.ids().lookup_key(&key(1)).unwrap();

        let mut transfer = tx(1, key(1), key(2), 4, 0);
        transfer.source = Address::Id(id);
        cache.apply_block(&block_of(vec![transfer])).unwrap();
        assert_eq!(
            cache.find(&key(1)).unwrap().balance,
            Amount::from_integral(6)
        );
    }

    #[test]
    fn unknown_compact_id_is_an_error() {
        let mut cache = WalletsCache::new();
        let mut transfer = tx(1, key(1), key(2), 1, 0);
        transfer.source = Address::Id(777);
        let result = cache.apply_block(&block_of(vec![transfer]));
        assert!(matches!(result, Err(LedgerError::UnknownWalletId(777))));
    }
}
