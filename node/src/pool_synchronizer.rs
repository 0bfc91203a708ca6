//! Pool synchronizer — closes the gap between the local chain head and
//! the current round.
//!
//! The synchronizer assigns each neighbor a window of missing sequences,
//! re-asks a neighbor whose window went unanswered for too many rounds,
//! and steals a window from a peer once its retry count crosses the
//! configured threshold. Replies flow into storage with `by_sync = true`
//! and drain the cached-block buffer.

use crate::transport::Transport;
use conclave_ledger::Block;
use conclave_store::BlockStore;
use conclave_types::{RoundNumber, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Fallback request period when the poll frequency is event-driven.
const NEIGHBOURS_REQUEST_DELAY_MS: u64 = 350;

/// Pool synchronizer tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Peer answers one block per reply instead of the whole window.
    #[serde(default)]
    pub one_reply_block: bool,

    /// Window size: sequences requested from one neighbor at a time.
    #[serde(default = "default_block_pools_count")]
    pub block_pools_count: u32,

    /// Rounds a neighbor's window may go unanswered before re-asking.
    #[serde(default = "default_request_repeat")]
    pub request_repeat_round_count: u32,

    /// Retry count at which a sequence is stolen from its neighbor.
    #[serde(default = "default_neighbour_packets")]
    pub neighbour_packets_count: u32,

    /// Poll period in milliseconds; 1 means purely event-driven.
    #[serde(default = "default_verification_frequency")]
    pub sequences_verification_frequency: u32,

    /// Minimum lead of the round over the local head before sync starts.
    #[serde(default = "default_round_difference")]
    pub round_difference_for_sync: u64,
}

fn default_block_pools_count() -> u32 {
    25
}

fn default_request_repeat() -> u32 {
    20
}

fn default_neighbour_packets() -> u32 {
    10
}

fn default_verification_frequency() -> u32 {
    350
}

fn default_round_difference() -> u64 {
    2
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            one_reply_block: false,
            block_pools_count: default_block_pools_count(),
            request_repeat_round_count: default_request_repeat(),
            neighbour_packets_count: default_neighbour_packets(),
            sequences_verification_frequency: default_verification_frequency(),
            round_difference_for_sync: default_round_difference(),
        }
    }
}

/// What the synchronizer wants done after an event.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncAction {
    /// Ask the neighbor at `neighbour_index` (a transport index) for the
    /// listed sequences. `packet_id` is the retry counter of the window's
    /// most-retried sequence.
    SendBlockRequest {
        neighbour_index: u8,
        sequences: Vec<Sequence>,
        packet_id: u32,
    },
    StartTimer { period_ms: u64 },
    StopTimer,
    /// The chain is caught up; all sync state has been released.
    Finished,
}

/// Which counter prompted an activity check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CounterType {
    Round,
    Timer,
}

/// One peer and the request window assigned to it.
#[derive(Clone, Debug)]
struct Neighbour {
    index: u8,
    round_counter: u32,
    sequences: Vec<Sequence>,
}

impl Neighbour {
    fn new(index: u8) -> Self {
        Self {
            index,
            round_counter: 0,
            sequences: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.sequences.clear();
        self.round_counter = 0;
    }
}

/// The synchronizer. Collaborators (storage, transport) are passed per
/// call; the synchronizer owns only its own bookkeeping.
pub struct PoolSynchronizer {
    config: SyncConfig,
    started: bool,
    timer_running: bool,
    /// Outstanding sequences → retry count.
    requested: BTreeMap<Sequence, u32>,
    neighbours: Vec<Neighbour>,
}

impl PoolSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        info!(
            one_reply_block = config.one_reply_block,
            block_pools = config.block_pools_count,
            request_round = config.request_repeat_round_count,
            neighbour_packets = config.neighbour_packets_count,
            polling_frequency = config.sequences_verification_frequency,
            "pool synchronizer configured"
        );
        Self {
            config,
            started: false,
            timer_running: false,
            requested: BTreeMap::new(),
            neighbours: Vec::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_one_block_reply(&self) -> bool {
        self.config.one_reply_block
    }

    /// Re-evaluate the sync state for a round tick (or a BigBang).
    pub fn processing_sync(
        &mut self,
        round: RoundNumber,
        is_big_bang: bool,
        store: &dyn BlockStore,
        transport: &dyn Transport,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        if transport.neighbor_count() == 0 {
            info!(
                needed = round,
                window = self.config.block_pools_count,
                "cannot start sync (no neighbours)"
            );
            return actions;
        }

        let last_written = store.last_written_sequence();

        if last_written >= round {
            if self.show_progress(last_written, round, store) {
                self.finish(&mut actions);
            }
            return actions;
        }

        if !self.started && round < last_written + self.config.round_difference_for_sync {
            return actions;
        }

        let mut target = round;
        if self.started && target > 0 {
            // The in-flight tip belongs to the running round.
            target -= 1;
        }

        let reached = last_written + store.cached_blocks_size() as u64;
        info!(remaining = target.saturating_sub(reached), "blocks remaining");

        let use_timer = self.config.sequences_verification_frequency > 1;
        let delay_ms = if use_timer {
            self.config.sequences_verification_frequency as u64
        } else {
            NEIGHBOURS_REQUEST_DELAY_MS
        };

        // Already started, no BigBang: an event-driven setup needs no timer.
        if self.started && !use_timer && !is_big_bang && self.timer_running {
            self.timer_running = false;
            actions.push(SyncAction::StopTimer);
        }
        // Already started, but a BigBang arrived: poll until stable again.
        if self.started && !use_timer && is_big_bang && !self.timer_running {
            self.timer_running = true;
            actions.push(SyncAction::StartTimer { period_ms: delay_ms });
        }

        if !self.started {
            self.started = true;
            self.refresh_neighbours(transport);
            self.send_block_request(round, store, &mut actions);

            if is_big_bang || use_timer {
                self.timer_running = true;
                actions.push(SyncAction::StartTimer { period_ms: delay_ms });
            }
        } else if self.config.request_repeat_round_count > 0 {
            let need_request = self.check_activity(CounterType::Round, transport);
            let available = self.config.sequences_verification_frequency == 1
                && self.check_activity(CounterType::Timer, transport);

            if need_request || available {
                self.send_block_request(round, store, &mut actions);
            }
        }

        actions
    }

    /// Timer fired: re-request if any neighbor ran dry.
    pub fn on_timer(
        &mut self,
        round: RoundNumber,
        store: &dyn BlockStore,
        transport: &dyn Transport,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();
        if !self.started {
            return actions;
        }
        debug!(
            frequency = self.config.sequences_verification_frequency,
            "sync timer tick"
        );
        if self.check_activity(CounterType::Timer, transport) {
            self.send_block_request(round, store, &mut actions);
        }
        actions
    }

    /// A `RequestedBlock` reply arrived.
    pub fn get_block_reply(
        &mut self,
        blocks: Vec<Block>,
        packet_id: u32,
        round: RoundNumber,
        store: &mut dyn BlockStore,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();
        let (Some(front), Some(back)) = (blocks.first(), blocks.last()) else {
            return actions;
        };
        info!(
            count = blocks.len(),
            from = front.sequence,
            to = back.sequence,
            id = packet_id,
            "block reply"
        );

        let mut last_written = store.last_written_sequence();
        if last_written >= back.sequence {
            return actions;
        }

        let old_cached = store.cached_blocks_size();
        let old_last_written = last_written;

        for block in blocks {
            let sequence = block.sequence;

            self.check_neighbour_sequence(sequence);
            self.requested.remove(&sequence);

            if last_written > sequence {
                continue;
            }

            if store.store_block(block, true) {
                store.test_cached_blocks();
                last_written = store.last_written_sequence();
            }
        }

        if old_cached != store.cached_blocks_size() || old_last_written != last_written {
            if self.show_progress(last_written, round, store) {
                self.finish(&mut actions);
            }
        }
        actions
    }

    /// Drop all sync state: outstanding windows are released and the
    /// timer forgotten. Used at node shutdown.
    pub fn shutdown(&mut self) {
        self.started = false;
        self.timer_running = false;
        self.requested.clear();
        self.neighbours.clear();
    }

    /// The transport's neighbor set changed size; resize ours to match.
    pub fn refresh_neighbours(&mut self, transport: &dyn Transport) {
        let needed = transport.neighbor_count_without_ss();
        let current = self.neighbours.len();

        if current == needed {
            return;
        }
        debug!(needed, "refreshing sync neighbours");

        let all = transport.neighbor_count();

        // Add new neighbours.
        if current < needed {
            for i in current as u8..all as u8 {
                let Some(info) = transport.neighbor_by_index(i) else {
                    continue;
                };
                if info.is_signal || info.last_sequence == 0 {
                    continue;
                }
                if !self.neighbours.iter().any(|n| n.index == i) {
                    self.neighbours.push(Neighbour::new(i));
                }
            }
            debug!(saved = self.neighbours.len(), "neighbours saved");
            return;
        }

        // Refresh indices over the surviving connections.
        let mut current_nh = 0usize;
        for i in 0..all as u8 {
            let Some(info) = transport.neighbor_by_index(i) else {
                continue;
            };
            if !info.is_signal {
                if let Some(neighbour) = self.neighbours.get_mut(current_nh) {
                    neighbour.index = i;
                }
                current_nh += 1;
            }
        }

        // Remove extra neighbours, releasing their windows.
        while self.neighbours.len() > needed {
            if let Some(removed) = self.neighbours.pop() {
                for seq in &removed.sequences {
                    self.requested.remove(seq);
                }
            }
        }
        debug!(saved = self.neighbours.len(), "neighbours saved");
    }

    // ── Requests ───────────────────────────────────────────────────────

    fn send_block_request(
        &mut self,
        round: RoundNumber,
        store: &dyn BlockStore,
        actions: &mut Vec<SyncAction>,
    ) {
        if self.neighbours.is_empty() {
            return;
        }

        for nh in 0..self.neighbours.len() {
            if !self.get_needed_sequences(nh, round, store) {
                debug!(neighbour = self.neighbours[nh].index, "neighbour is busy");
                continue;
            }
            if self.neighbours[nh].sequences.is_empty() {
                debug!("all sequences already requested");
                continue;
            }
            self.send_block(nh, actions);
        }
    }

    fn send_block(&mut self, nh: usize, actions: &mut Vec<SyncAction>) {
        let sequences = self.neighbours[nh].sequences.clone();
        let index = self.neighbours[nh].index;

        let mut packet_id = 0;
        for sequence in &sequences {
            let counter = self.requested.entry(*sequence).or_insert(0);
            *counter += 1;
            packet_id = *counter;
        }

        info!(
            neighbour = index,
            count = sequences.len(),
            from = sequences.first().copied().unwrap_or_default(),
            to = sequences.last().copied().unwrap_or_default(),
            id = packet_id,
            "sending block request"
        );

        actions.push(SyncAction::SendBlockRequest {
            neighbour_index: index,
            sequences,
            packet_id,
        });
    }

    /// Decide what (if anything) to ask this neighbor for. Returns false
    /// when the neighbor should be skipped this pass.
    fn get_needed_sequences(
        &mut self,
        nh: usize,
        round: RoundNumber,
        store: &dyn BlockStore,
    ) -> bool {
        let last_written = store.last_written_sequence();
        let is_last_packet = self.is_last_request(round, store);

        // Closing window: the whole remaining tail goes to everyone who
        // is free, so whichever neighbor answers first finishes the sync.
        if is_last_packet && !self.requested.is_empty() {
            debug!("last packet of the sync");

            let front = self.neighbours[nh].sequences.first().copied();
            if let Some(front) = front {
                if self.requested.contains_key(&front) {
                    if self.is_available_request(nh) {
                        self.neighbours[nh].round_counter = 0;
                        return true;
                    }
                    return false;
                }
            }

            self.neighbours[nh].reset();
            let tail: Vec<Sequence> = self.requested.keys().copied().collect();
            self.neighbours[nh].sequences = tail;
            return true;
        }

        let required_blocks = store.required_ranges();

        // Prune satisfied sequences.
        self.requested = self.requested.split_off(&(last_written + 1));

        let mut sequence;

        let needs_help = if self.config.neighbour_packets_count > 0 && !is_last_packet {
            self.requested
                .iter()
                .find(|(_, count)| **count >= self.config.neighbour_packets_count)
                .map(|(seq, _)| *seq)
        } else {
            None
        };

        if self.requested.is_empty() {
            sequence = last_written;
            debug!(sequence, "window starts at the chain head");
        } else if let Some(stolen) = needs_help {
            // A sequence has been retried too often against its holder:
            // move that whole window here.
            debug!(sequence = stolen, "stealing an overdue window");

            if !self.neighbours[nh].sequences.is_empty()
                && self.neighbours[nh].sequences.first() != Some(&stolen)
            {
                for seq in self.neighbours[nh].sequences.clone() {
                    self.requested.remove(&seq);
                }
                self.neighbours[nh].reset();
            }

            let holder = self
                .neighbours
                .iter()
                .position(|el| !el.sequences.is_empty() && el.sequences.first() == Some(&stolen));
            let Some(holder) = holder else {
                warn!(sequence = stolen, "no neighbour holds the overdue window");
                return false;
            };
            if holder == nh {
                self.neighbours[nh].round_counter = 0;
                return true;
            }
            self.neighbours[nh].sequences = self.neighbours[holder].sequences.clone();
            self.neighbours[holder].reset();
            return true;
        } else if self.is_available_request(nh) {
            debug!(
                neighbour = self.neighbours[nh].index,
                "repeating an unanswered request"
            );
            self.neighbours[nh].round_counter = 0;
            return true;
        } else {
            sequence = self
                .requested
                .keys()
                .next_back()
                .copied()
                .unwrap_or(last_written)
                .max(last_written);
            debug!(sequence, "window starts after the outstanding tail");
        }

        if !self.neighbours[nh].sequences.is_empty() {
            return false;
        }

        // Fill the window, skipping sequences that are not actually
        // missing (per the storage gap report).
        self.neighbours[nh].sequences.clear();
        for _ in 0..self.config.block_pools_count {
            sequence += 1;

            if let Some(last) = required_blocks.last() {
                if last.1 != 0 && sequence > last.1 {
                    debug!("window reached the top of the required ranges");
                    break;
                }
            }

            for j in 1..required_blocks.len() {
                // Inside a required interval: keep it.
                if sequence > required_blocks[j].0 && sequence < required_blocks[j].1 {
                    break;
                }
                // Between intervals: jump to the next interval's start.
                if sequence > required_blocks[j - 1].1 && sequence < required_blocks[j].0 {
                    sequence = required_blocks[j].0;
                    break;
                }
            }

            self.neighbours[nh].sequences.push(sequence);
        }

        true
    }

    // ── Bookkeeping ────────────────────────────────────────────────────

    /// Strike a satisfied sequence from every neighbor's window.
    fn check_neighbour_sequence(&mut self, sequence: Sequence) {
        for neighbour in &mut self.neighbours {
            neighbour.sequences.retain(|seq| *seq != sequence);
            if neighbour.sequences.is_empty() {
                neighbour.reset();
            }
        }
        self.neighbours.sort_by_key(|n| n.index);
    }

    fn check_activity(&mut self, counter: CounterType, transport: &dyn Transport) -> bool {
        self.refresh_neighbours(transport);
        if self.neighbours.is_empty() {
            return false;
        }

        match counter {
            CounterType::Round => {
                let mut need_request = false;
                for nh in 0..self.neighbours.len() {
                    self.neighbours[nh].round_counter += 1;
                    if !need_request && self.is_available_request(nh) {
                        need_request = true;
                    }
                }
                need_request
            }
            CounterType::Timer => self.neighbours.iter().any(|n| n.sequences.is_empty()),
        }
    }

    fn is_last_request(&self, round: RoundNumber, store: &dyn BlockStore) -> bool {
        let remaining = round
            .saturating_sub(store.last_written_sequence())
            .saturating_sub(store.cached_blocks_size() as u64);
        remaining <= self.config.block_pools_count as u64
    }

    fn is_available_request(&self, nh: usize) -> bool {
        self.neighbours[nh].round_counter >= self.config.request_repeat_round_count
    }

    fn show_progress(
        &self,
        last_written: Sequence,
        round: RoundNumber,
        store: &dyn BlockStore,
    ) -> bool {
        if round == 0 {
            warn!("current round number is 0");
            return false;
        }
        let reached = last_written + store.cached_blocks_size() as u64;
        let global = round - 1;
        let remaining = global.saturating_sub(reached);
        let percent = if global == 0 {
            100
        } else {
            ((reached * 100) / global).min(100)
        };
        info!(remaining, percent, "sync progress");
        remaining == 0
    }

    fn finish(&mut self, actions: &mut Vec<SyncAction>) {
        if self.timer_running {
            self.timer_running = false;
            actions.push(SyncAction::StopTimer);
        }
        self.started = false;
        self.requested.clear();
        self.neighbours.clear();
        actions.push(SyncAction::Finished);
        info!("synchro finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NeighborInfo;
    use conclave_messages::Frame;
    use conclave_store::MemoryBlockStore;
    use conclave_types::{Hash, PublicKey, UserFields};

    struct FakeTransport {
        neighbours: Vec<NeighborInfo>,
    }

    impl FakeTransport {
        fn with_peers(n: usize) -> Self {
            Self {
                neighbours: (0..n)
                    .map(|i| NeighborInfo {
                        key: PublicKey([i as u8 + 100; 32]),
                        is_signal: false,
                        last_sequence: 1,
                    })
                    .collect(),
            }
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, _frame: Frame, _to: &PublicKey) {}
        fn broadcast(&self, _frame: Frame) {}
        fn neighbor_count(&self) -> usize {
            self.neighbours.len()
        }
        fn neighbor_by_index(&self, index: u8) -> Option<NeighborInfo> {
            self.neighbours.get(index as usize).cloned()
        }
        fn clear_tasks(&self) {}
    }

    fn block(sequence: Sequence, previous_hash: Hash) -> Block {
        Block::build(
            sequence,
            previous_hash,
            vec![PublicKey([1u8; 32]); 3],
            Vec::new(),
            UserFields::new(),
        )
    }

    /// Store with blocks 0..=head written.
    fn store_with_head(head: Sequence) -> MemoryBlockStore {
        let mut store = MemoryBlockStore::new();
        let mut previous = Hash::ZERO;
        for seq in 0..=head {
            let b = block(seq, previous);
            previous = b.hash();
            assert!(store.store_block(b, false));
        }
        store
    }

    fn config_for_scenario() -> SyncConfig {
        SyncConfig {
            block_pools_count: 10,
            request_repeat_round_count: 20,
            neighbour_packets_count: 10,
            sequences_verification_frequency: 1,
            round_difference_for_sync: 2,
            one_reply_block: false,
        }
    }

    fn requests_of(actions: &[SyncAction]) -> Vec<(u8, Vec<Sequence>)> {
        actions
            .iter()
            .filter_map(|a| match a {
                SyncAction::SendBlockRequest {
                    neighbour_index,
                    sequences,
                    ..
                } => Some((*neighbour_index, sequences.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn no_neighbours_means_no_requests() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let store = store_with_head(100);
        let transport = FakeTransport::with_peers(0);

        let actions = sync.processing_sync(130, false, &store, &transport);
        assert!(actions.is_empty());
        assert!(!sync.is_started());
    }

    #[test]
    fn small_lead_does_not_start_sync() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        let actions = sync.processing_sync(101, false, &store, &transport);
        assert!(actions.is_empty());
        assert!(!sync.is_started());
    }

    #[test]
    fn first_tick_splits_windows_across_neighbours() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        let actions = sync.processing_sync(130, false, &store, &transport);
        assert!(sync.is_started());

        let requests = requests_of(&actions);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1, (101..=110).collect::<Vec<_>>());
        assert_eq!(requests[1].1, (111..=120).collect::<Vec<_>>());
    }

    #[test]
    fn delivery_frees_neighbour_for_the_next_window() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let mut store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        sync.processing_sync(130, false, &store, &transport);

        // Deliver 101..=110 as one chained reply.
        let mut previous = store.hash_by_sequence(100).unwrap();
        let mut delivery = Vec::new();
        for seq in 101..=110 {
            let b = block(seq, previous);
            previous = b.hash();
            delivery.push(b);
        }
        let actions = sync.get_block_reply(delivery, 1, 130, &mut store);
        assert!(actions.is_empty()); // progressed but not finished
        assert_eq!(store.last_written_sequence(), 110);

        // The freed neighbour picks up the next window on the next tick.
        let actions = sync.processing_sync(130, false, &store, &transport);
        let requests = requests_of(&actions);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, (121..=130).collect::<Vec<_>>());
    }

    #[test]
    fn sync_finishes_at_zero_remaining() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let mut store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        sync.processing_sync(130, false, &store, &transport);

        let mut previous = store.hash_by_sequence(100).unwrap();
        let mut delivery = Vec::new();
        for seq in 101..=130 {
            let b = block(seq, previous);
            previous = b.hash();
            delivery.push(b);
        }
        let actions = sync.get_block_reply(delivery, 1, 130, &mut store);

        assert_eq!(store.last_written_sequence(), 130);
        assert!(actions.contains(&SyncAction::Finished));
        assert!(!sync.is_started());
    }

    #[test]
    fn overdue_window_is_stolen() {
        let mut config = config_for_scenario();
        config.neighbour_packets_count = 3;
        // Never considered "available" so the repeat branch stays out of
        // the way.
        config.request_repeat_round_count = 1_000;
        let mut sync = PoolSynchronizer::new(config);
        let store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        // First tick assigns windows; re-request the same window enough
        // times to cross the steal threshold.
        sync.processing_sync(1000, false, &store, &transport);
        for nh in 0..sync.neighbours.len() {
            for _ in 0..3 {
                sync.send_block(nh, &mut Vec::new());
            }
        }
        assert!(sync.requested.values().any(|count| *count >= 3));

        let n0_window = sync.neighbours[0].sequences.clone();

        // Neighbour 1 asks for work: the overdue window moves to it.
        assert!(sync.get_needed_sequences(1, 1000, &store));
        assert_eq!(sync.neighbours[1].sequences, n0_window);
        assert!(sync.neighbours[0].sequences.is_empty());
    }

    #[test]
    fn windows_skip_sequences_already_cached() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let mut store = store_with_head(100);
        // 105 and 106 already arrived out of order.
        store.store_block(block(105, Hash::ZERO), true);
        store.store_block(block(106, Hash::ZERO), true);
        let transport = FakeTransport::with_peers(1);

        let actions = sync.processing_sync(200, false, &store, &transport);
        let requests = requests_of(&actions);
        assert_eq!(requests.len(), 1);
        // The window skips the cached 105..=106 interval.
        assert!(!requests[0].1.contains(&105));
        assert!(!requests[0].1.contains(&106));
        assert_eq!(requests[0].1.len(), 10);
        assert_eq!(requests[0].1[..4], [101, 102, 103, 104]);
        assert_eq!(requests[0].1[4], 107);
    }

    #[test]
    fn closing_tail_duplicated_to_free_neighbours() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        // Gap of 6 ≤ window size: whatever the first neighbour was asked
        // for becomes the outstanding tail, and the second free neighbour
        // mirrors it so whichever answers first closes the sync.
        let actions = sync.processing_sync(106, false, &store, &transport);
        let requests = requests_of(&actions);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1, (101..=110).collect::<Vec<_>>());
        assert_eq!(requests[1].1, requests[0].1);
    }

    #[test]
    fn timer_tick_requests_when_a_neighbour_is_idle() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let mut store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        sync.processing_sync(130, false, &store, &transport);

        // Nothing to do while both neighbours hold windows.
        assert!(sync.on_timer(130, &store, &transport).is_empty());

        // Deliver one window; the idle neighbour triggers a new request.
        let mut previous = store.hash_by_sequence(100).unwrap();
        let mut delivery = Vec::new();
        for seq in 101..=110 {
            let b = block(seq, previous);
            previous = b.hash();
            delivery.push(b);
        }
        sync.get_block_reply(delivery, 1, 130, &mut store);

        let actions = sync.on_timer(130, &store, &transport);
        assert!(!requests_of(&actions).is_empty());
    }

    #[test]
    fn shrinking_neighbour_set_releases_windows() {
        let mut sync = PoolSynchronizer::new(config_for_scenario());
        let store = store_with_head(100);
        let transport = FakeTransport::with_peers(2);

        sync.processing_sync(130, false, &store, &transport);
        assert_eq!(sync.neighbours.len(), 2);
        let released: Vec<Sequence> = sync.neighbours[1].sequences.clone();
        assert!(!released.is_empty());

        let transport = FakeTransport::with_peers(1);
        sync.refresh_neighbours(&transport);
        assert_eq!(sync.neighbours.len(), 1);
        for seq in released {
            assert!(!sync.requested.contains_key(&seq));
        }
    }
}
