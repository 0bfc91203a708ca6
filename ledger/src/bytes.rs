//! Canonical byte encoding for hashed and signed structures.
//!
//! Hashing and signing need a byte representation that is stable across
//! versions and platforms, so the hashed prefixes of blocks, transactions
//! and packets are written by hand: little-endian integers, length-prefixed
//! sequences. The transport payloads use serde/bincode independently.

use conclave_types::{Address, Amount, Hash, PublicKey, Signature, UserField, UserFields};

pub(crate) fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub(crate) fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i128(out: &mut Vec<u8>, v: i128) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_hash(out: &mut Vec<u8>, h: &Hash) {
    out.extend_from_slice(h.as_bytes());
}

pub(crate) fn put_key(out: &mut Vec<u8>, k: &PublicKey) {
    out.extend_from_slice(k.as_bytes());
}

pub(crate) fn put_signature(out: &mut Vec<u8>, s: &Signature) {
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn put_amount(out: &mut Vec<u8>, a: &Amount) {
    put_i128(out, a.raw());
}

pub(crate) fn put_address(out: &mut Vec<u8>, a: &Address) {
    match a {
        Address::Key(k) => {
            put_u8(out, 0);
            put_key(out, k);
        }
        Address::Id(id) => {
            put_u8(out, 1);
            put_u32(out, *id);
        }
    }
}

pub(crate) fn put_user_fields(out: &mut Vec<u8>, fields: &UserFields) {
    put_u32(out, fields.len() as u32);
    for (id, field) in fields {
        put_u32(out, *id);
        match field {
            UserField::Integer(v) => {
                put_u8(out, 0);
                put_i64(out, *v);
            }
            UserField::Text(s) => {
                put_u8(out, 1);
                put_u32(out, s.len() as u32);
                out.extend_from_slice(s.as_bytes());
            }
            UserField::Bytes(b) => {
                put_u8(out, 2);
                put_u32(out, b.len() as u32);
                out.extend_from_slice(b);
            }
        }
    }
}
