//! The wire frame and its bit-exact header layout.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! offset 0              flags (u8)
//! non-fragmented:       id @ 1 (u64), sender @ 9 (32 B), addressee @ 41 (32 B, unicast only)
//! fragmented:           fragment_id @ 1 (u16), fragments_num @ 3 (u16),
//!                       id @ 5 (u64), sender @ 13 (32 B), addressee @ 45 (32 B, unicast only)
//! then:                 kind (u8), round (u64), payload
//! ```

use crate::codec;
use crate::error::CodecError;
use crate::flags;
use crate::kind::MessageKind;
use conclave_types::{PublicKey, RoundNumber};
use tracing::debug;

/// Maximum bytes a single fragment may occupy on the wire.
pub const MAX_FRAGMENT_SIZE: usize = 1 << 10;

/// Maximum fragments one message may span.
pub const MAX_FRAGMENTS: usize = 1 << 12;

/// Upper bound on a reassembled, decompressed payload.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAGMENT_SIZE * MAX_FRAGMENTS;

/// Fragment position within a multi-fragment message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentInfo {
    pub fragment_id: u16,
    pub fragments_num: u16,
}

/// A decoded wire frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub flags: u8,
    pub fragment: Option<FragmentInfo>,
    pub id: u64,
    pub sender: PublicKey,
    pub addressee: Option<PublicKey>,
    pub kind: MessageKind,
    pub round: RoundNumber,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a broadcast frame.
    pub fn broadcast(
        id: u64,
        sender: PublicKey,
        kind: MessageKind,
        round: RoundNumber,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            flags: flags::BROADCAST,
            fragment: None,
            id,
            sender,
            addressee: None,
            kind,
            round,
            payload,
        }
    }

    /// Build a unicast frame.
    pub fn direct(
        id: u64,
        sender: PublicKey,
        addressee: PublicKey,
        kind: MessageKind,
        round: RoundNumber,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            flags: flags::SIGNED,
            fragment: None,
            id,
            sender,
            addressee: Some(addressee),
            kind,
            round,
            payload,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags & flags::BROADCAST != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & flags::COMPRESSED != 0
    }

    /// Whether a delivered frame concerns this node.
    pub fn addressed_to_me(&self, my_key: &PublicKey) -> bool {
        self.flags & (flags::NETWORK_MSG | flags::NEIGHBOURS) != 0
            || (self.is_broadcast() && self.sender != *my_key)
            || self.addressee.as_ref() == Some(my_key)
    }

    /// Mark the payload for compression on encode.
    pub fn with_compression(mut self) -> Self {
        self.flags |= flags::COMPRESSED;
        self
    }

    /// Encode to wire bytes.
    ///
    /// When the `Compressed` flag is set the payload is LZ4 compressed;
    /// if compression does not shrink it the flag is cleared and the raw
    /// payload is sent instead.
    pub fn encode(&self) -> Vec<u8> {
        let mut flags_byte = self.flags;
        let payload: Vec<u8> = if self.is_compressed() {
            let packed = codec::compress(&self.payload);
            if packed.len() < self.payload.len() {
                packed
            } else {
                debug!(
                    raw = self.payload.len(),
                    packed = packed.len(),
                    "skipping payload compression"
                );
                flags_byte &= !flags::COMPRESSED;
                self.payload.clone()
            }
        } else {
            self.payload.clone()
        };

        if self.fragment.is_some() {
            flags_byte |= flags::FRAGMENTED;
        } else {
            flags_byte &= !flags::FRAGMENTED;
        }

        let mut out = Vec::with_capacity(64 + payload.len());
        out.push(flags_byte);
        if let Some(info) = self.fragment {
            out.extend_from_slice(&info.fragment_id.to_le_bytes());
            out.extend_from_slice(&info.fragments_num.to_le_bytes());
        }
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(self.sender.as_bytes());
        if flags::has_addressee(flags_byte) {
            let addressee = self.addressee.unwrap_or(PublicKey::ZERO);
            out.extend_from_slice(addressee.as_bytes());
        }
        out.push(self.kind as u8);
        out.extend_from_slice(&self.round.to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    /// Decode from wire bytes. Compressed payloads are inflated and the
    /// flag cleared.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut pos = 0usize;
        let flags_byte = *bytes.first().ok_or(CodecError::Truncated { need: 1, have: 0 })?;
        pos += 1;

        let fragment = if flags_byte & flags::FRAGMENTED != 0 {
            let fragment_id = read_u16(bytes, &mut pos)?;
            let fragments_num = read_u16(bytes, &mut pos)?;
            if fragments_num == 0
                || fragments_num as usize > MAX_FRAGMENTS
                || fragment_id >= fragments_num
            {
                return Err(CodecError::BadFragment {
                    fragment_id,
                    fragments_num,
                });
            }
            Some(FragmentInfo {
                fragment_id,
                fragments_num,
            })
        } else {
            None
        };

        let id = read_u64(bytes, &mut pos)?;
        let sender = PublicKey(read_array(bytes, &mut pos)?);
        let addressee = if flags::has_addressee(flags_byte) {
            Some(PublicKey(read_array(bytes, &mut pos)?))
        } else {
            None
        };

        let kind_byte = read_u8(bytes, &mut pos)?;
        let kind = MessageKind::from_u8(kind_byte).ok_or(CodecError::UnknownKind(kind_byte))?;
        let round = read_u64(bytes, &mut pos)?;

        let mut payload = bytes[pos..].to_vec();
        let mut final_flags = flags_byte;
        if flags_byte & flags::COMPRESSED != 0 {
            payload = codec::decompress(&payload, MAX_PAYLOAD_SIZE)?;
            final_flags &= !flags::COMPRESSED;
        }

        Ok(Self {
            flags: final_flags,
            fragment,
            id,
            sender,
            addressee,
            kind,
            round,
            payload,
        })
    }
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8, CodecError> {
    let value = *bytes.get(*pos).ok_or(CodecError::Truncated {
        need: *pos + 1,
        have: bytes.len(),
    })?;
    *pos += 1;
    Ok(value)
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> Result<u16, CodecError> {
    let slice = bytes.get(*pos..*pos + 2).ok_or(CodecError::Truncated {
        need: *pos + 2,
        have: bytes.len(),
    })?;
    *pos += 2;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64, CodecError> {
    let slice = bytes.get(*pos..*pos + 8).ok_or(CodecError::Truncated {
        need: *pos + 8,
        have: bytes.len(),
    })?;
    *pos += 8;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(slice);
    Ok(u64::from_le_bytes(arr))
}

fn read_array(bytes: &[u8], pos: &mut usize) -> Result<[u8; 32], CodecError> {
    let slice = bytes.get(*pos..*pos + 32).ok_or(CodecError::Truncated {
        need: *pos + 32,
        have: bytes.len(),
    })?;
    *pos += 32;
    let mut arr = [0u8; 32];
    arr.copy_from_slice(slice);
    Ok(arr)
}
