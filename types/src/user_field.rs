//! Free-form key/value fields attached to transactions and blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User field id carrying the block timestamp: a base-10 signed integer in
/// text form (milliseconds since the epoch).
pub const TIMESTAMP_FIELD: u32 = 0;

/// User field id tagging a transaction as a contract new-state record.
pub const NEW_STATE_FIELD: u32 = 1;

/// A single user field value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserField {
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Ordered user field map. Ordering matters because the map participates
/// in the hashed byte representation of blocks and transactions.
pub type UserFields = BTreeMap<u32, UserField>;

/// Read the timestamp user field, if present and well-formed.
pub fn timestamp_of(fields: &UserFields) -> Option<i64> {
    match fields.get(&TIMESTAMP_FIELD)? {
        UserField::Text(s) => s.parse().ok(),
        UserField::Integer(v) => Some(*v),
        UserField::Bytes(_) => None,
    }
}
