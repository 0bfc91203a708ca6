//! Reassembly of fragmented messages.
//!
//! Fragments of one message share `(sender, id)`. The assembler buffers
//! them until every position is filled, then returns a single frame whose
//! payload is the in-order concatenation. Inconsistent fragment counts are
//! a protocol error: the partial message is discarded, the peer is kept.

use crate::error::CodecError;
use crate::frame::{Frame, MAX_FRAGMENTS};
use conclave_types::PublicKey;
use std::collections::HashMap;
use tracing::debug;

struct Partial {
    fragments: Vec<Option<Frame>>,
    received: usize,
}

/// Collects fragments until their message completes.
#[derive(Default)]
pub struct FragmentAssembler {
    pending: HashMap<(PublicKey, u64), Partial>,
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame. Unfragmented frames pass straight through; a
    /// fragment either completes its message (returning the reassembled
    /// frame) or is buffered.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Frame>, CodecError> {
        let Some(info) = frame.fragment else {
            return Ok(Some(frame));
        };

        if info.fragments_num as usize > MAX_FRAGMENTS {
            return Err(CodecError::BadFragment {
                fragment_id: info.fragment_id,
                fragments_num: info.fragments_num,
            });
        }

        let key = (frame.sender, frame.id);

        if let Some(partial) = self.pending.get(&key) {
            if partial.fragments.len() != info.fragments_num as usize {
                debug!(
                    sender = %frame.sender,
                    id = frame.id,
                    "fragment count mismatch, dropping partial message"
                );
                self.pending.remove(&key);
                return Err(CodecError::BadFragment {
                    fragment_id: info.fragment_id,
                    fragments_num: info.fragments_num,
                });
            }
        }

        let partial = self.pending.entry(key).or_insert_with(|| Partial {
            fragments: {
                let mut v = Vec::with_capacity(info.fragments_num as usize);
                v.resize_with(info.fragments_num as usize, || None);
                v
            },
            received: 0,
        });

        let slot = &mut partial.fragments[info.fragment_id as usize];
        if slot.is_none() {
            partial.received += 1;
        }
        *slot = Some(frame);

        if partial.received < partial.fragments.len() {
            return Ok(None);
        }

        let Some(partial) = self.pending.remove(&key) else {
            return Ok(None);
        };
        let mut payload = Vec::new();
        let mut first: Option<Frame> = None;
        for fragment in partial.fragments.into_iter().flatten() {
            payload.extend_from_slice(&fragment.payload);
            if first.is_none() {
                first = Some(fragment);
            }
        }
        Ok(first.map(|f| Frame {
            fragment: None,
            payload,
            ..f
        }))
    }

    /// Number of messages still awaiting fragments.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FragmentInfo;
    use crate::kind::MessageKind;

    fn fragment(id: u64, fragment_id: u16, fragments_num: u16, payload: Vec<u8>) -> Frame {
        let mut frame = Frame::broadcast(
            id,
            PublicKey([1u8; 32]),
            MessageKind::NewBlock,
            4,
            payload,
        );
        frame.fragment = Some(FragmentInfo {
            fragment_id,
            fragments_num,
        });
        frame
    }

    #[test]
    fn unfragmented_passes_through() {
        let mut assembler = FragmentAssembler::new();
        let frame = Frame::broadcast(1, PublicKey([1u8; 32]), MessageKind::BlockHash, 2, vec![1]);
        let out = assembler.push(frame.clone()).unwrap();
        assert_eq!(out, Some(frame));
    }

    #[test]
    fn fragments_reassemble_in_order() {
        let mut assembler = FragmentAssembler::new();
        assert!(assembler.push(fragment(7, 1, 3, vec![4, 5])).unwrap().is_none());
        assert!(assembler.push(fragment(7, 0, 3, vec![1, 2, 3])).unwrap().is_none());
        let done = assembler.push(fragment(7, 2, 3, vec![6])).unwrap().unwrap();

        assert_eq!(done.payload, vec![1, 2, 3, 4, 5, 6]);
        assert!(done.fragment.is_none());
        assert_eq!(assembler.pending_count(), 0);
    }

    #[test]
    fn duplicate_fragment_does_not_complete_early() {
        let mut assembler = FragmentAssembler::new();
        assert!(assembler.push(fragment(7, 0, 2, vec![1])).unwrap().is_none());
        assert!(assembler.push(fragment(7, 0, 2, vec![1])).unwrap().is_none());
        assert!(assembler.push(fragment(7, 1, 2, vec![2])).unwrap().is_some());
    }

    #[test]
    fn count_mismatch_is_protocol_error() {
        let mut assembler = FragmentAssembler::new();
        assert!(assembler.push(fragment(7, 0, 3, vec![1])).unwrap().is_none());
        assert!(assembler.push(fragment(7, 1, 4, vec![2])).is_err());
        // The partial was discarded.
        assert_eq!(assembler.pending_count(), 0);
    }

    #[test]
    fn interleaved_messages_tracked_separately() {
        let mut assembler = FragmentAssembler::new();
        assert!(assembler.push(fragment(1, 0, 2, vec![1])).unwrap().is_none());
        assert!(assembler.push(fragment(2, 0, 2, vec![9])).unwrap().is_none());
        assert_eq!(assembler.pending_count(), 2);

        let done = assembler.push(fragment(2, 1, 2, vec![8])).unwrap().unwrap();
        assert_eq!(done.payload, vec![9, 8]);
        assert_eq!(assembler.pending_count(), 1);
    }
}
