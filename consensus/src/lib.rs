//! Round-based consensus.
//!
//! One round elects a general, declares a confidant set, exchanges three
//! stages of evidence and designates a writer that publishes the round's
//! block. This crate holds the round state, the stage messages, the
//! consensus state machine, the transaction-packet conveyer shared with
//! the sync subsystem, and the cooperative timer scheduler.
//!
//! ## Module overview
//!
//! - [`round`] — round table, roles, per-round state and accumulators.
//! - [`stage`] — the three signed stage messages.
//! - [`machine`] — the state machine (NoState/Normal/Trusted/Writing/Waiting).
//! - [`conveyer`] — content-addressed transaction-packet cache.
//! - [`scheduler`] — cancellable one-shot timers.
//! - [`error`] — consensus error types.

pub mod conveyer;
pub mod error;
pub mod machine;
pub mod round;
pub mod scheduler;
pub mod stage;

pub use conveyer::Conveyer;
pub use error::ConsensusError;
pub use machine::{Action, Characteristic, CtxView, Event, StateMachine, StateTag, TransitionResult};
pub use round::{Role, RoundState, RoundTable};
pub use scheduler::{Scheduler, TimerId};
pub use stage::{StageKind, StageOne, StageThree, StageTwo};
