//! Transfer transactions.

use crate::bytes::{put_address, put_amount, put_i64, put_signature, put_user_fields};
use conclave_types::{Address, Amount, Signature, UserFields, NEW_STATE_FIELD};
use serde::{Deserialize, Serialize};

/// A single transfer from `source` to `target`.
///
/// `inner_id` is assigned by the source wallet and must be monotone per
/// source; replay protection relies on the bounded window kept in
/// [`crate::TransactionsTail`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub inner_id: i64,
    pub source: Address,
    pub target: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub signature: Signature,
    pub user_fields: UserFields,
}

impl Transaction {
    /// Whether this transaction carries a contract new-state record.
    pub fn is_new_state(&self) -> bool {
        self.user_fields.contains_key(&NEW_STATE_FIELD)
    }

    /// The bytes covered by the source's signature: everything except the
    /// signature itself.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        put_i64(&mut out, self.inner_id);
        put_address(&mut out, &self.source);
        put_address(&mut out, &self.target);
        put_amount(&mut out, &self.amount);
        put_amount(&mut out, &self.fee);
        put_user_fields(&mut out, &self.user_fields);
        out
    }

    /// The full canonical serialization, signature included. Packet hashes
    /// are computed over the concatenation of these.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.signing_bytes();
        put_signature(&mut out, &self.signature);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{PublicKey, UserField, TIMESTAMP_FIELD};

    fn sample_tx(inner_id: i64) -> Transaction {
        Transaction {
            inner_id,
            source: Address::Key(PublicKey([1u8; 32])),
            target: Address::Key(PublicKey([2u8; 32])),
            amount: Amount::from_integral(10),
            fee: Amount::from_raw(1),
            signature: Signature([3u8; 64]),
            user_fields: UserFields::new(),
        }
    }

    #[test]
    fn signing_bytes_exclude_signature() {
        let mut tx = sample_tx(1);
        let signing_before = tx.signing_bytes();
        let canonical_before = tx.canonical_bytes();
        tx.signature = Signature([9u8; 64]);
        assert_eq!(tx.signing_bytes(), signing_before);
        assert_ne!(tx.canonical_bytes(), canonical_before);
    }

    #[test]
    fn canonical_bytes_distinguish_ids() {
        assert_ne!(sample_tx(1).canonical_bytes(), sample_tx(2).canonical_bytes());
    }

    #[test]
    fn new_state_recognised_by_user_field() {
        let mut tx = sample_tx(1);
        assert!(!tx.is_new_state());
        tx.user_fields
            .insert(conclave_types::NEW_STATE_FIELD, UserField::Bytes(vec![0xAA]));
        assert!(tx.is_new_state());

        // An unrelated field does not trigger the tag.
        let mut other = sample_tx(2);
        other
            .user_fields
            .insert(TIMESTAMP_FIELD, UserField::Text("1".into()));
        assert!(!other.is_new_state());
    }
}
