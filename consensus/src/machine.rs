//! The consensus state machine.
//!
//! One node moves through {NoState, Normal, Trusted, Writing, Waiting}
//! driven by round tables, stage receipts, blocks, hashes, timeouts and
//! BigBang resets. The machine is synchronous and side-effect free: every
//! event returns the [`Action`]s the node must perform (sends, broadcasts,
//! block stores), and timers are drained cooperatively so no callback can
//! interleave with a transition.
//!
//! Events a state does not accept are logged at debug and swallowed;
//! failures are logged and consumed; a finished event drives the
//! transition table.

use crate::conveyer::Conveyer;
use crate::round::{Role, RoundState, RoundTable};
use crate::scheduler::{Scheduler, TimerId};
use crate::stage::{StageKind, StageOne, StageThree, StageTwo};
use conclave_crypto::{blake2b_256_multi, sign_message};
use conclave_ledger::{Block, Transaction};
use conclave_types::{
    ConsensusParams, Hash, KeyPair, PublicKey, RoundNumber, Sequence, Signature, UserField,
    UserFields, TIMESTAMP_FIELD,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Discriminant of the machine's current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateTag {
    NoState,
    Normal,
    Trusted,
    Writing,
    Waiting,
}

/// Uniform completion result of one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionResult {
    /// The event was consumed and drove the machine.
    Finish,
    /// The event is not accepted in the current state.
    Ignore,
    /// The event was malformed or inconsistent; logged and consumed.
    Failure,
}

/// Everything the machine may ask the node to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Validate and persist a block received from `sender`.
    StoreBlock { block: Block, sender: PublicKey },
    /// Confirm a stored block's hash back to its sender.
    SendHash { hash: Hash, to: PublicKey },
    BroadcastStage1(StageOne),
    BroadcastStage2(StageTwo),
    BroadcastStage3(StageThree),
    /// Serve our own stage of `kind` to the requesting confidant.
    SendStage { kind: StageKind, to: u8 },
    /// Ask the listed confidants for their missing stage of `kind`.
    RequestStages { kind: StageKind, from: Vec<u8> },
    BroadcastBlock(Block),
    BroadcastCharacteristic(Characteristic),
    /// Announce the next round (writer path).
    SpawnNextRound(RoundTable),
    /// Ask the bracketing confidants what happened to the round.
    RequestRoundInfo { from: (u8, u8) },
}

/// Inclusion mask accompanying a freshly written block: one bit per
/// packet transaction, plus the block's timestamp user field.
#[derive(Clone, Debug, PartialEq)]
pub struct Characteristic {
    pub sequence: Sequence,
    pub mask: Vec<u8>,
    pub mask_bits: u32,
    pub timestamp: String,
}

/// Read-only context the node supplies with every event.
pub struct CtxView<'a> {
    pub keypair: &'a KeyPair,
    pub last_written: Sequence,
    pub previous_hash: Hash,
    pub now: Instant,
    pub timestamp_ms: i64,
}

/// Consensus events.
#[derive(Clone, Debug)]
pub enum Event {
    RoundTable(RoundTable),
    Stage1(StageOne),
    Stage2(StageTwo),
    Stage3(StageThree),
    StageRequest { kind: StageKind, from: u8 },
    Transaction(Transaction),
    TransactionList(Vec<Transaction>),
    Block { block: Block, sender: PublicKey },
    Hash { hash: Hash, sender: PublicKey },
    BigBang { round: RoundNumber },
    RoundEnd,
}

enum ConsensusTimer {
    StateExpired(StateTag),
    ActivateNewRound,
}

/// The machine. Owns the round state and its timers; shares the conveyer
/// with the rest of the node.
pub struct StateMachine {
    state: StateTag,
    round: RoundState,
    conveyer: Arc<Conveyer>,
    params: ConsensusParams,
    my_key: PublicKey,
    scheduler: Scheduler<ConsensusTimer>,
    state_timeout: Option<TimerId>,
    waiting_timer: Option<TimerId>,
    sent_stage2: bool,
    sent_stage3: bool,
    spawned_next: bool,
    offenders: HashSet<u8>,
    future_blocks: BTreeMap<Sequence, (Block, PublicKey)>,
    produced_block: Option<Block>,
}

impl StateMachine {
    pub fn new(my_key: PublicKey, conveyer: Arc<Conveyer>, params: ConsensusParams) -> Self {
        Self {
            state: StateTag::NoState,
            round: RoundState::new(),
            conveyer,
            params,
            my_key,
            scheduler: Scheduler::new(),
            state_timeout: None,
            waiting_timer: None,
            sent_stage2: false,
            sent_stage3: false,
            spawned_next: false,
            offenders: HashSet::new(),
            future_blocks: BTreeMap::new(),
            produced_block: None,
        }
    }

    pub fn state(&self) -> StateTag {
        self.state
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn current_round(&self) -> RoundNumber {
        self.round.current_round
    }

    pub fn future_blocks_len(&self) -> usize {
        self.future_blocks.len()
    }

    /// Confidant indices whose stages failed signature verification this
    /// round.
    pub fn offenders(&self) -> &HashSet<u8> {
        &self.offenders
    }

    /// The soonest pending timer deadline, for the node's driving loop.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Feed one event.
    pub fn handle(&mut self, ctx: &CtxView, event: Event) -> (TransitionResult, Vec<Action>) {
        let (result, actions) = self.dispatch(ctx, event);
        match result {
            TransitionResult::Failure => {
                error!(state = ?self.state, "consensus event failed");
            }
            TransitionResult::Ignore => {}
            TransitionResult::Finish => {}
        }
        (result, actions)
    }

    /// Drain due timers and run the expiry hooks of whatever is still the
    /// current state.
    pub fn poll_timers(&mut self, ctx: &CtxView) -> Vec<Action> {
        let mut actions = Vec::new();
        for timer in self.scheduler.drain_due(ctx.now) {
            match timer {
                ConsensusTimer::StateExpired(armed_for) => {
                    self.state_timeout = None;
                    if armed_for == self.state {
                        actions.extend(self.on_state_expired(ctx));
                    }
                }
                ConsensusTimer::ActivateNewRound => {
                    self.waiting_timer = None;
                    if self.state == StateTag::Waiting {
                        actions.extend(self.activate_new_round());
                    }
                }
            }
        }
        actions
    }

    fn dispatch(&mut self, ctx: &CtxView, event: Event) -> (TransitionResult, Vec<Action>) {
        match event {
            Event::RoundTable(table) => self.on_round_table(ctx, table),
            Event::BigBang { round } => self.on_big_bang(round),
            Event::Block { block, sender } => self.on_block(ctx, block, sender),
            Event::Hash { hash, sender } => self.on_hash(hash, sender),
            Event::Stage1(stage) => self.on_stage1(ctx, stage),
            Event::Stage2(stage) => self.on_stage2(ctx, stage),
            Event::Stage3(stage) => self.on_stage3(ctx, stage),
            Event::StageRequest { kind, from } => self.on_stage_request(kind, from),
            Event::Transaction(_) | Event::TransactionList(_) => {
                debug!(state = ?self.state, "transactions ignored by the state machine");
                (TransitionResult::Ignore, Vec::new())
            }
            Event::RoundEnd => {
                self.cancel_timers();
                (TransitionResult::Finish, Vec::new())
            }
        }
    }

    // ── Round start ────────────────────────────────────────────────────

    fn on_round_table(&mut self, ctx: &CtxView, table: RoundTable) -> (TransitionResult, Vec<Action>) {
        if let Err(err) = table.validate() {
            warn!(%err, round = table.round, "round table rejected");
            return (TransitionResult::Failure, Vec::new());
        }
        if table.round == self.round.current_round && self.state != StateTag::NoState {
            // Re-delivery of the current round's table is a no-op.
            debug!(round = table.round, "duplicate round table");
            return (TransitionResult::Ignore, Vec::new());
        }

        self.cancel_timers();
        self.sent_stage2 = false;
        self.sent_stage3 = false;
        self.spawned_next = false;
        self.produced_block = None;
        self.offenders.clear();

        self.round.install(table, &self.my_key);
        info!(
            round = self.round.current_round,
            role = ?self.round.role,
            confidants = self.round.cnt_trusted(),
            "round installed"
        );

        let mut actions = self.drain_future_blocks(ctx.last_written);

        match self.round.role {
            Role::Confidant => {
                self.state = StateTag::Trusted;
                self.arm_state_timeout(ctx.now);
                actions.extend(self.emit_stage1(ctx));
            }
            Role::Main | Role::Normal | Role::Writer => {
                self.state = StateTag::Normal;
            }
        }
        (TransitionResult::Finish, actions)
    }

    fn on_big_bang(&mut self, round: RoundNumber) -> (TransitionResult, Vec<Action>) {
        warn!(round, "BigBang: resetting consensus");
        self.cancel_timers();
        self.scheduler.clear();
        self.future_blocks.clear();
        self.sent_stage2 = false;
        self.sent_stage3 = false;
        self.spawned_next = false;
        self.produced_block = None;
        self.offenders.clear();
        self.round.reset(round);
        self.state = StateTag::NoState;
        (TransitionResult::Finish, Vec::new())
    }

    // ── Blocks and hashes ──────────────────────────────────────────────

    fn on_block(&mut self, ctx: &CtxView, block: Block, sender: PublicKey) -> (TransitionResult, Vec<Action>) {
        if self.state == StateTag::Writing {
            warn!("writer cannot accept blocks");
            return (TransitionResult::Ignore, Vec::new());
        }

        let expected = ctx.last_written + 1;
        if block.sequence < expected {
            debug!(sequence = block.sequence, expected, "stale block ignored");
            return (TransitionResult::Ignore, Vec::new());
        }
        if block.sequence > expected {
            debug!(sequence = block.sequence, expected, "buffering future block");
            self.future_blocks.insert(block.sequence, (block, sender));
            return (TransitionResult::Ignore, Vec::new());
        }

        let hash = block.hash();
        let mut actions = vec![
            Action::StoreBlock { block, sender },
            Action::SendHash { hash, to: sender },
        ];
        actions.extend(self.drain_future_blocks(expected));
        (TransitionResult::Finish, actions)
    }

    /// Emit stores for the contiguous run of buffered blocks following
    /// `last_written` (exclusive of blocks already handed over).
    fn drain_future_blocks(&mut self, last_written: Sequence) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut next = last_written + 1;
        while let Some((block, sender)) = self.future_blocks.remove(&next) {
            debug!(sequence = next, "draining buffered block");
            actions.push(Action::StoreBlock { block, sender });
            next += 1;
        }
        // Anything below the head is stale by definition.
        self.future_blocks = self.future_blocks.split_off(&next);
        actions
    }

    fn on_hash(&mut self, hash: Hash, sender: PublicKey) -> (TransitionResult, Vec<Action>) {
        if self.state != StateTag::Writing {
            debug!("hash confirmation ignored outside Writing");
            return (TransitionResult::Ignore, Vec::new());
        }
        let Some(produced) = &self.produced_block else {
            return (TransitionResult::Failure, Vec::new());
        };
        if produced.hash() != hash {
            warn!(%sender, "peer confirmed a different block hash");
            return (TransitionResult::Failure, Vec::new());
        }
        self.round.hashes.insert(sender, hash);

        let quorum = self.round.cnt_trusted() / 2 + 1;
        if self.round.hashes.len() >= quorum && !self.spawned_next {
            let actions = self.spawn_next_round();
            return (TransitionResult::Finish, actions);
        }
        (TransitionResult::Finish, Vec::new())
    }

    // ── Stages ─────────────────────────────────────────────────────────

    fn on_stage1(&mut self, ctx: &CtxView, stage: StageOne) -> (TransitionResult, Vec<Action>) {
        if self.state != StateTag::Trusted {
            debug!(state = ?self.state, "stage one ignored");
            return (TransitionResult::Ignore, Vec::new());
        }
        if !stage.verify(self.round.current_round, &self.round.confidants) {
            warn!(sender = stage.sender, "stage one signature failure");
            self.offenders.insert(stage.sender);
            return (TransitionResult::Failure, Vec::new());
        }
        let slot = stage.sender as usize;
        if self.round.stage1[slot].is_some() {
            return (TransitionResult::Ignore, Vec::new());
        }
        self.round.stage1[slot] = Some(stage);
        let actions = self.try_progress(ctx);
        (TransitionResult::Finish, actions)
    }

    fn on_stage2(&mut self, ctx: &CtxView, stage: StageTwo) -> (TransitionResult, Vec<Action>) {
        if self.state != StateTag::Trusted {
            debug!(state = ?self.state, "stage two ignored");
            return (TransitionResult::Ignore, Vec::new());
        }
        if !stage.verify(self.round.current_round, &self.round.confidants) {
            warn!(sender = stage.sender, "stage two signature failure");
            self.offenders.insert(stage.sender);
            return (TransitionResult::Failure, Vec::new());
        }
        let slot = stage.sender as usize;
        if self.round.stage2[slot].is_some() {
            return (TransitionResult::Ignore, Vec::new());
        }
        self.round.stage2[slot] = Some(stage);
        let actions = self.try_progress(ctx);
        (TransitionResult::Finish, actions)
    }

    fn on_stage3(&mut self, ctx: &CtxView, stage: StageThree) -> (TransitionResult, Vec<Action>) {
        if self.state != StateTag::Trusted {
            debug!(state = ?self.state, "stage three ignored");
            return (TransitionResult::Ignore, Vec::new());
        }
        if !stage.verify(self.round.current_round, &self.round.confidants) {
            warn!(sender = stage.sender, "stage three signature failure");
            self.offenders.insert(stage.sender);
            return (TransitionResult::Failure, Vec::new());
        }
        let slot = stage.sender as usize;
        if self.round.stage3[slot].is_some() {
            return (TransitionResult::Ignore, Vec::new());
        }
        self.round.stage3[slot] = Some(stage);
        let actions = self.try_progress(ctx);
        (TransitionResult::Finish, actions)
    }

    fn on_stage_request(&mut self, kind: StageKind, from: u8) -> (TransitionResult, Vec<Action>) {
        if !matches!(self.state, StateTag::Trusted | StateTag::Writing | StateTag::Waiting) {
            return (TransitionResult::Ignore, Vec::new());
        }
        let Some(my_index) = self.round.my_conf_index else {
            return (TransitionResult::Ignore, Vec::new());
        };
        let have_own = match kind {
            StageKind::First => self.round.stage1.get(my_index as usize).is_some_and(Option::is_some),
            StageKind::Second => self.round.stage2.get(my_index as usize).is_some_and(Option::is_some),
            StageKind::Third => self.round.stage3.get(my_index as usize).is_some_and(Option::is_some),
        };
        if !have_own {
            return (TransitionResult::Ignore, Vec::new());
        }
        (TransitionResult::Finish, vec![Action::SendStage { kind, to: from }])
    }

    /// Advance the stage pipeline as far as the accumulated evidence
    /// allows: all stage-1 → send stage 2; all stage-2 → send stage 3;
    /// stage-3 agreement → Writing or Waiting.
    fn try_progress(&mut self, ctx: &CtxView) -> Vec<Action> {
        let mut actions = Vec::new();
        let cnt = self.round.cnt_trusted();
        let Some(my_index) = self.round.my_conf_index else {
            return actions;
        };

        if self.round.stage1_count() == cnt && !self.sent_stage2 {
            let signatures: Vec<Signature> = self
                .round
                .stage1
                .iter()
                .map(|slot| slot.as_ref().map(|s| s.signature).unwrap_or(Signature::ZERO))
                .collect();
            match StageTwo::sign(self.round.current_round, my_index, signatures, ctx.keypair) {
                Some(stage) => {
                    self.sent_stage2 = true;
                    self.round.stage2[my_index as usize] = Some(stage.clone());
                    actions.push(Action::BroadcastStage2(stage));
                }
                None => error!("cannot sign stage two"),
            }
        }

        if self.round.stage2_count() == cnt && !self.sent_stage3 {
            let writer = self.elect_writer();
            let real_trusted: Vec<u8> = (0..cnt)
                .map(|i| ((i + cnt - writer as usize) % cnt) as u8)
                .collect();
            match StageThree::sign(
                self.round.current_round,
                my_index,
                writer,
                real_trusted,
                ctx.keypair,
            ) {
                Some(stage) => {
                    self.sent_stage3 = true;
                    self.round.stage3[my_index as usize] = Some(stage.clone());
                    actions.push(Action::BroadcastStage3(stage));
                }
                None => error!("cannot sign stage three"),
            }
        }

        if let Some(own) = self.round.stage3.get(my_index as usize).and_then(Option::as_ref) {
            let quorum = cnt / 2 + 1;
            let agreeing = self
                .round
                .stage3
                .iter()
                .flatten()
                .filter(|s| s.writer == own.writer)
                .count();
            if agreeing >= quorum {
                let queue = own.own_queue_number();
                let writer = own.writer;
                if queue == 0 {
                    info!("stage three complete: becoming writer");
                    actions.extend(self.enter_writing(ctx));
                } else {
                    info!(queue, writer, "stage three complete: waiting for the writer");
                    self.enter_waiting(ctx, queue);
                }
            }
        }
        actions
    }

    /// Deterministic writer election over the collected candidates: every
    /// confidant derives the same index from the stage-1 hashes.
    fn elect_writer(&self) -> u8 {
        let round_bytes = self.round.current_round.to_le_bytes();
        let mut parts: Vec<&[u8]> = vec![&round_bytes];
        for stage in self.round.stage1.iter().flatten() {
            parts.push(stage.candidate_hash.as_bytes());
        }
        let digest = blake2b_256_multi(&parts);
        (digest[0] as usize % self.round.cnt_trusted().max(1)) as u8
    }

    // ── Writing ────────────────────────────────────────────────────────

    fn enter_writing(&mut self, ctx: &CtxView) -> Vec<Action> {
        self.state = StateTag::Writing;
        self.round.role = Role::Writer;
        self.arm_state_timeout(ctx.now);

        let Some(my_index) = self.round.my_conf_index else {
            error!("writer without a confidant index");
            return Vec::new();
        };

        // Collect the round's transactions from the conveyer, in declared
        // packet order.
        let mut transactions: Vec<Transaction> = Vec::new();
        for hash in &self.round.declared_hashes {
            if let Some(packet) = self.conveyer.get(hash) {
                transactions.extend(packet.transactions);
            } else {
                debug!(%hash, "declared packet missing at write time");
            }
        }

        let mut user_fields = UserFields::new();
        user_fields.insert(
            TIMESTAMP_FIELD,
            UserField::Text(ctx.timestamp_ms.to_string()),
        );

        let mut block = Block::build(
            ctx.last_written + 1,
            ctx.previous_hash,
            self.round.confidants.clone(),
            transactions,
            user_fields.clone(),
        );
        block.real_trusted_mask = 1u64 << my_index;
        let digest = block.hash();
        let Some(signature) = sign_message(digest.as_bytes(), &ctx.keypair.private) else {
            error!("cannot sign produced block");
            return Vec::new();
        };
        block.signatures.push(signature);

        let tx_count = block.transactions_count() as u32;
        let mut mask = vec![0u8; tx_count.div_ceil(8) as usize];
        for i in 0..tx_count {
            mask[(i / 8) as usize] |= 1 << (i % 8);
        }

        self.produced_block = Some(block.clone());
        info!(
            sequence = block.sequence,
            transactions = tx_count,
            "producing block"
        );

        vec![
            Action::StoreBlock {
                block: block.clone(),
                sender: self.my_key,
            },
            Action::BroadcastBlock(block),
            Action::BroadcastCharacteristic(Characteristic {
                sequence: ctx.last_written + 1,
                mask,
                mask_bits: tx_count,
                timestamp: ctx.timestamp_ms.to_string(),
            }),
        ]
    }

    fn spawn_next_round(&mut self) -> Vec<Action> {
        self.spawned_next = true;
        let table = RoundTable {
            round: self.round.current_round + 1,
            general: self.my_key,
            confidants: self.round.confidants.clone(),
            hashes: Vec::new(),
        };
        info!(round = table.round, "spawning next round");
        vec![Action::SpawnNextRound(table)]
    }

    // ── Waiting ────────────────────────────────────────────────────────

    fn enter_waiting(&mut self, ctx: &CtxView, queue: u8) {
        self.state = StateTag::Waiting;
        if let Some(id) = self.state_timeout.take() {
            self.scheduler.cancel(id);
        }
        let delay = Duration::from_millis(self.params.post_consensus_timeout_ms * queue as u64);
        self.waiting_timer =
            Some(self.scheduler.insert_once(ctx.now, delay, ConsensusTimer::ActivateNewRound));
    }

    fn activate_new_round(&mut self) -> Vec<Action> {
        let Some(my_index) = self.round.my_conf_index else {
            return Vec::new();
        };
        let Some(own) = self
            .round
            .stage3
            .get(my_index as usize)
            .and_then(Option::as_ref)
        else {
            error!("cannot access own stage three on waiting expiry");
            return Vec::new();
        };
        let cnt = self.round.cnt_trusted() as i32;
        let queue = own.own_queue_number() as i32;
        let writer = own.writer as i32;
        let previous = ((writer + queue - 1).rem_euclid(cnt)) as u8;
        let next = ((writer + queue + 1).rem_euclid(cnt)) as u8;
        info!(previous, next, "waiting expired: requesting round info");
        vec![Action::RequestRoundInfo {
            from: (previous, next),
        }]
    }

    // ── Timeouts ───────────────────────────────────────────────────────

    fn arm_state_timeout(&mut self, now: Instant) {
        if let Some(id) = self.state_timeout.take() {
            self.scheduler.cancel(id);
        }
        let delay = Duration::from_millis(self.params.default_state_timeout_ms);
        self.state_timeout = Some(self.scheduler.insert_once(
            now,
            delay,
            ConsensusTimer::StateExpired(self.state),
        ));
    }

    fn on_state_expired(&mut self, ctx: &CtxView) -> Vec<Action> {
        match self.state {
            StateTag::Trusted => {
                // Ask peers for whatever stage is holding us up, then
                // re-arm to keep nagging.
                let cnt = self.round.cnt_trusted();
                let actions = if self.round.stage1_count() < cnt {
                    vec![Action::RequestStages {
                        kind: StageKind::First,
                        from: RoundState::missing_in(&self.round.stage1),
                    }]
                } else if self.round.stage2_count() < cnt {
                    vec![Action::RequestStages {
                        kind: StageKind::Second,
                        from: RoundState::missing_in(&self.round.stage2),
                    }]
                } else {
                    vec![Action::RequestStages {
                        kind: StageKind::Third,
                        from: RoundState::missing_in(&self.round.stage3),
                    }]
                };
                self.arm_state_timeout(ctx.now);
                actions
            }
            StateTag::Writing => {
                if self.spawned_next {
                    Vec::new()
                } else {
                    warn!("writing expired without hash quorum: advancing anyway");
                    self.spawn_next_round()
                }
            }
            _ => Vec::new(),
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(id) = self.state_timeout.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.waiting_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    // ── Round start helpers ────────────────────────────────────────────

    fn emit_stage1(&mut self, ctx: &CtxView) -> Vec<Action> {
        let Some(my_index) = self.round.my_conf_index else {
            return Vec::new();
        };
        let candidate_hash = self.candidate_hash();
        match StageOne::sign(self.round.current_round, my_index, candidate_hash, ctx.keypair) {
            Some(stage) => {
                self.round.stage1[my_index as usize] = Some(stage.clone());
                vec![Action::BroadcastStage1(stage)]
            }
            None => {
                error!("cannot sign stage one");
                Vec::new()
            }
        }
    }

    /// Digest over the declared packet hashes: the candidate this node
    /// proposes for the round.
    fn candidate_hash(&self) -> Hash {
        if self.round.declared_hashes.is_empty() {
            return Hash::ZERO;
        }
        let round_bytes = self.round.current_round.to_le_bytes();
        let mut parts: Vec<&[u8]> = vec![&round_bytes];
        for hash in &self.round.declared_hashes {
            parts.push(hash.as_bytes());
        }
        Hash::new(blake2b_256_multi(&parts))
    }
}
