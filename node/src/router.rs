//! Round policy and postponed-message replay.
//!
//! Before dispatch, every accepted frame is classified against the current
//! round: processed now, postponed until its round starts, or dropped.

use conclave_messages::{Frame, MessageKind};
use conclave_types::{RoundNumber, Sequence};
use tracing::debug;

/// Verdict of the round policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageAction {
    Process,
    Postpone,
    Drop,
}

/// Classify a frame by kind and round.
pub fn choose_action(
    kind: MessageKind,
    round: RoundNumber,
    current_round: RoundNumber,
    last_written: Sequence,
) -> MessageAction {
    if kind == MessageKind::BigBang && round > last_written {
        return MessageAction::Process;
    }
    if kind == MessageKind::RoundTableRequest {
        return if round < current_round {
            MessageAction::Process
        } else {
            MessageAction::Drop
        };
    }
    if kind == MessageKind::RoundTable {
        return if round > current_round {
            MessageAction::Process
        } else {
            MessageAction::Drop
        };
    }
    if kind == MessageKind::BlockRequest || kind == MessageKind::RequestedBlock {
        return if round <= current_round {
            MessageAction::Process
        } else {
            MessageAction::Drop
        };
    }
    if round < current_round {
        return if kind == MessageKind::NewBlock {
            MessageAction::Process
        } else {
            MessageAction::Drop
        };
    }
    if round == current_round {
        MessageAction::Process
    } else {
        MessageAction::Postpone
    }
}

/// Messages held for a future round, replayed when that round starts.
#[derive(Default)]
pub struct PostponedQueue {
    frames: Vec<Frame>,
}

impl PostponedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        debug!(round = frame.round, kind = ?frame.kind, "postponing message");
        self.frames.push(frame);
    }

    /// Remove and return the frames whose round has arrived. Frames for
    /// rounds that are already behind `round` are discarded.
    pub fn take_due(&mut self, round: RoundNumber) -> Vec<Frame> {
        let mut due = Vec::new();
        self.frames.retain_mut(|frame| {
            if frame.round == round {
                due.push(frame.clone());
                false
            } else {
                frame.round > round
            }
        });
        due
    }

    /// Drop everything (BigBang: the old timeline's messages are void).
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
