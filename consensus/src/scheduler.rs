//! Cancellable one-shot timers on a cooperative clock.
//!
//! Callbacks never run from here: the owner drains due events on its own
//! processing thread (`drain_due`), so timer work can never interleave
//! with a state transition. Cancelling an id that already fired is a
//! harmless no-op, which is exactly what state-exit cleanup wants.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Handle to a scheduled one-shot entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Entry<T> {
    fire_at: Instant,
    event: T,
}

/// Deterministic one-shot timer queue.
pub struct Scheduler<T> {
    next_id: u64,
    entries: BTreeMap<u64, Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` to fire `delay` after `now`.
    pub fn insert_once(&mut self, now: Instant, delay: Duration, event: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                fire_at: now + delay,
                event,
            },
        );
        TimerId(id)
    }

    /// Cancel a pending entry. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id.0).is_some()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id.0)
    }

    /// Remove and return every event due at `now`, in scheduling order.
    pub fn drain_due(&mut self, now: Instant) -> Vec<T> {
        let due: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.fire_at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|e| e.event)
            .collect()
    }

    /// The soonest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.fire_at).min()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}
