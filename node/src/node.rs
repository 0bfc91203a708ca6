//! The node: one logical processing loop over all core subsystems.
//!
//! Frames delivered by the transport pass the round-policy router and are
//! turned into consensus events, conveyer inserts, or synchronizer inputs.
//! The consensus machine answers with [`Action`]s, the synchronizer with
//! [`SyncAction`]s; this module interprets both against the transport and
//! storage.

use crate::config::NodeConfig;
use crate::pool_synchronizer::{PoolSynchronizer, SyncAction};
use crate::router::{choose_action, MessageAction, PostponedQueue};
use crate::transport::Transport;
use conclave_consensus::{
    Action, Characteristic, Conveyer, CtxView, Event, RoundTable, StageKind, StateMachine,
    StateTag,
};
use conclave_ledger::{Block, Transaction, TransactionsPacket, WalletsCache, WalletsPools};
use conclave_messages::{codec, Frame, MessageKind};
use conclave_store::BlockStore;
use conclave_types::{Hash, KeyPair, PublicKey, RoundNumber, Sequence};
use conclave_validation::{BlockValidator, ValidationContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Sequences wanted from a peer, and the retry counter for logging.
#[derive(Serialize, Deserialize)]
pub struct BlockRequestPayload {
    pub sequences: Vec<Sequence>,
    pub packet_id: u32,
}

/// Blocks answering a [`BlockRequestPayload`].
#[derive(Serialize, Deserialize)]
pub struct BlockReplyPayload {
    pub packet_id: u32,
    pub blocks: Vec<Block>,
}

/// Inclusion mask of a freshly produced block; the mask travels LZ4
/// compressed.
#[derive(Serialize, Deserialize)]
pub struct CharacteristicPayload {
    pub sequence: Sequence,
    pub compressed_mask: Vec<u8>,
    pub mask_bits: u32,
    pub timestamp: String,
}

/// The assembled node core.
pub struct CoreNode {
    keypair: KeyPair,
    store: Box<dyn BlockStore>,
    wallets: WalletsCache,
    pools: WalletsPools,
    conveyer: Arc<Conveyer>,
    machine: StateMachine,
    validator: BlockValidator,
    synchronizer: PoolSynchronizer,
    postponed: PostponedQueue,
    transport: Arc<dyn Transport>,
    round_table: Option<RoundTable>,
    frame_id: u64,
    /// Next sequence whose wallet effects have not been applied yet.
    applied_next: Sequence,
    /// Set on a fatal validation outcome: consensus participation stops,
    /// read service continues.
    halted: bool,
    sync_timer: Option<(Duration, Instant)>,
}

impl CoreNode {
    pub fn new(
        config: &NodeConfig,
        keypair: KeyPair,
        store: Box<dyn BlockStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let conveyer = Arc::new(Conveyer::new());
        let machine = StateMachine::new(
            keypair.public,
            Arc::clone(&conveyer),
            config.consensus.clone(),
        );
        Self {
            keypair,
            store,
            wallets: WalletsCache::new(),
            pools: WalletsPools::new(),
            conveyer,
            machine,
            validator: BlockValidator::with_default_plugins(),
            synchronizer: PoolSynchronizer::new(config.sync.clone()),
            postponed: PostponedQueue::new(),
            transport,
            round_table: None,
            frame_id: 0,
            applied_next: 0,
            halted: false,
            sync_timer: None,
        }
    }

    pub fn my_key(&self) -> PublicKey {
        self.keypair.public
    }

    pub fn state(&self) -> StateTag {
        self.machine.state()
    }

    pub fn current_round(&self) -> RoundNumber {
        self.machine.current_round()
    }

    pub fn last_written(&self) -> Sequence {
        self.store.last_written_sequence()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn wallets(&self) -> &WalletsCache {
        &self.wallets
    }

    pub fn pools(&self) -> &WalletsPools {
        &self.pools
    }

    pub fn conveyer(&self) -> &Conveyer {
        &self.conveyer
    }

    pub fn postponed_len(&self) -> usize {
        self.postponed.len()
    }

    /// Write the shared genesis block (sequence 0) and apply it.
    pub fn bootstrap_genesis(&mut self, genesis: Block) {
        if self.store.store_block(genesis, false) {
            self.apply_written_blocks();
        }
    }

    /// Drive the node until the inbound channel closes.
    pub async fn run(&mut self, mut inbound: tokio::sync::mpsc::Receiver<Frame>) {
        info!(key = %self.keypair.public, "node loop started");
        let mut tick = tokio::time::interval(Duration::from_millis(50));
        loop {
            tokio::select! {
                maybe = inbound.recv() => match maybe {
                    Some(frame) => self.on_frame(frame),
                    None => break,
                },
                _ = tick.tick() => self.on_tick(),
            }
        }
        self.shutdown();
        info!("node loop stopped");
    }

    /// Tear down timers and release all sync windows.
    pub fn shutdown(&mut self) {
        let actions = self.machine_event(Event::RoundEnd);
        self.process_actions(actions);
        self.synchronizer.shutdown();
        self.sync_timer = None;
    }

    /// Cooperative timer pass: consensus timeouts, then the sync poll.
    pub fn on_tick(&mut self) {
        let actions = {
            let ctx = Self::ctx(&self.keypair, &*self.store);
            self.machine.poll_timers(&ctx)
        };
        self.process_actions(actions);

        if let Some((period, last_fire)) = self.sync_timer {
            if last_fire.elapsed() >= period {
                self.sync_timer = Some((period, Instant::now()));
                let actions = self.synchronizer.on_timer(
                    self.machine.current_round(),
                    &*self.store,
                    &*self.transport,
                );
                self.process_sync_actions(actions);
            }
        }
    }

    // ── Inbound path ───────────────────────────────────────────────────

    /// Entry point for one delivered frame.
    pub fn on_frame(&mut self, frame: Frame) {
        if !frame.addressed_to_me(&self.keypair.public) {
            return;
        }
        if self.halted && frame.kind != MessageKind::BlockRequest {
            debug!(kind = ?frame.kind, "halted: serving reads only");
            return;
        }

        match choose_action(
            frame.kind,
            frame.round,
            self.machine.current_round(),
            self.store.last_written_sequence(),
        ) {
            MessageAction::Process => self.dispatch(frame),
            MessageAction::Postpone => self.postponed.push(frame),
            MessageAction::Drop => {
                debug!(kind = ?frame.kind, round = frame.round, "dropped by round policy");
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        let sender = frame.sender;
        let round = frame.round;
        let kind = frame.kind;

        let outcome: Result<(), conclave_messages::CodecError> = match kind {
            MessageKind::RoundTable => codec::decode_payload::<RoundTable>(&frame.payload)
                .map(|table| self.handle_round_table(table)),

            MessageKind::BigBang => {
                self.handle_big_bang(round);
                Ok(())
            }

            MessageKind::NewBlock => codec::decode_payload::<Block>(&frame.payload).map(|block| {
                let actions = self.machine_event(Event::Block { block, sender });
                self.process_actions(actions);
            }),

            MessageKind::BlockHash => codec::decode_payload::<Hash>(&frame.payload).map(|hash| {
                let actions = self.machine_event(Event::Hash { hash, sender });
                self.process_actions(actions);
            }),

            MessageKind::FirstStage => {
                codec::decode_payload(&frame.payload).map(|stage| {
                    let actions = self.machine_event(Event::Stage1(stage));
                    self.process_actions(actions);
                })
            }
            MessageKind::SecondStage => {
                codec::decode_payload(&frame.payload).map(|stage| {
                    let actions = self.machine_event(Event::Stage2(stage));
                    self.process_actions(actions);
                })
            }
            MessageKind::ThirdStage => {
                codec::decode_payload(&frame.payload).map(|stage| {
                    let actions = self.machine_event(Event::Stage3(stage));
                    self.process_actions(actions);
                })
            }

            MessageKind::FirstStageRequest
            | MessageKind::SecondStageRequest
            | MessageKind::ThirdStageRequest => {
                codec::decode_payload::<u8>(&frame.payload).map(|from| {
                    let stage_kind = match kind {
                        MessageKind::FirstStageRequest => StageKind::First,
                        MessageKind::SecondStageRequest => StageKind::Second,
                        _ => StageKind::Third,
                    };
                    let actions = self.machine_event(Event::StageRequest {
                        kind: stage_kind,
                        from,
                    });
                    self.process_actions(actions);
                })
            }

            MessageKind::TransactionPacket | MessageKind::TransactionsPacketReply => {
                codec::decode_payload::<TransactionsPacket>(&frame.payload).map(|packet| {
                    if let Err(err) = self.conveyer.insert(packet) {
                        warn!(%err, "rejected transaction packet");
                    }
                })
            }

            MessageKind::TransactionsPacketRequest => {
                codec::decode_payload::<Vec<Hash>>(&frame.payload).map(|hashes| {
                    for hash in hashes {
                        if let Some(packet) = self.conveyer.get(&hash) {
                            let payload = match codec::encode_payload(&packet) {
                                Ok(payload) => payload,
                                Err(err) => {
                                    error!(%err, "cannot encode packet reply");
                                    continue;
                                }
                            };
                            self.send_to(MessageKind::TransactionsPacketReply, payload, &sender);
                        }
                    }
                })
            }

            MessageKind::Transactions => {
                codec::decode_payload::<Vec<Transaction>>(&frame.payload).map(|transactions| {
                    let packet = TransactionsPacket::new(transactions);
                    if let Err(err) = self.conveyer.insert(packet) {
                        warn!(%err, "rejected loose transactions");
                    }
                })
            }

            MessageKind::TransactionList => {
                codec::decode_payload::<Vec<Transaction>>(&frame.payload).map(|transactions| {
                    let actions = self.machine_event(Event::TransactionList(transactions));
                    self.process_actions(actions);
                })
            }

            MessageKind::BlockRequest => {
                codec::decode_payload::<BlockRequestPayload>(&frame.payload)
                    .map(|request| self.serve_block_request(request, &sender))
            }

            MessageKind::RequestedBlock => {
                codec::decode_payload::<BlockReplyPayload>(&frame.payload).map(|reply| {
                    let actions = self.synchronizer.get_block_reply(
                        reply.blocks,
                        reply.packet_id,
                        self.machine.current_round(),
                        &mut *self.store,
                    );
                    self.apply_written_blocks();
                    self.process_sync_actions(actions);
                })
            }

            MessageKind::RoundTableRequest | MessageKind::RoundInfoRequest => {
                self.serve_round_table(&sender, kind);
                Ok(())
            }

            MessageKind::RoundInfo | MessageKind::RoundInfoReply => {
                codec::decode_payload::<RoundTable>(&frame.payload).map(|table| {
                    if table.round > self.machine.current_round() {
                        self.handle_round_table(table);
                    }
                })
            }

            MessageKind::NewCharacteristic => {
                codec::decode_payload::<CharacteristicPayload>(&frame.payload).map(|payload| {
                    match codec::decompress(
                        &payload.compressed_mask,
                        conclave_messages::frame::MAX_PAYLOAD_SIZE,
                    ) {
                        Ok(mask) => debug!(
                            sequence = payload.sequence,
                            mask_bits = payload.mask_bits,
                            mask_bytes = mask.len(),
                            "characteristic received"
                        ),
                        Err(err) => warn!(%err, "malformed characteristic mask"),
                    }
                })
            }

            MessageKind::ConsVector
            | MessageKind::ConsMatrix
            | MessageKind::ConsVectorRequest
            | MessageKind::ConsMatrixRequest
            | MessageKind::ConsTLRequest
            | MessageKind::NewBadBlock
            | MessageKind::WriterNotification => {
                debug!(kind = ?kind, "kind carried for wire compatibility, no handler");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            // Protocol error: drop the message, keep the peer.
            warn!(kind = ?kind, %sender, %err, "malformed payload dropped");
        }
    }

    // ── Round advancement ──────────────────────────────────────────────

    /// Install a new round: reset per-round state, notify consensus and
    /// the synchronizer, replay postponed messages.
    pub fn handle_round_table(&mut self, table: RoundTable) {
        self.transport.clear_tasks();
        self.store.note_global_sequence(table.round.saturating_sub(1));
        self.round_table = Some(table.clone());
        self.request_missing_packets(&table.hashes);

        let actions = self.machine_event(Event::RoundTable(table));
        self.process_actions(actions);

        info!(
            round = self.machine.current_round(),
            role = ?self.machine.round().role,
            "round started"
        );

        for frame in self.postponed.take_due(self.machine.current_round()) {
            debug!(kind = ?frame.kind, "replaying postponed message");
            self.dispatch(frame);
        }

        let current = self.machine.current_round();
        if current > self.store.last_written_sequence() + 1 || self.store.block_request_need() {
            let actions = self.synchronizer.processing_sync(
                current,
                false,
                &*self.store,
                &*self.transport,
            );
            self.process_sync_actions(actions);
        }
    }

    /// Fetch packets the round table declares but the conveyer lacks. The
    /// conveyer admits at most one in-flight request per hash.
    fn request_missing_packets(&mut self, declared: &[Hash]) {
        let wanted: Vec<Hash> = self
            .conveyer
            .missing_of(declared)
            .into_iter()
            .filter(|hash| self.conveyer.begin_request(*hash))
            .collect();
        if wanted.is_empty() {
            return;
        }
        debug!(count = wanted.len(), "requesting missing transaction packets");
        if let Ok(payload) = codec::encode_payload(&wanted) {
            self.broadcast(MessageKind::TransactionsPacketRequest, payload, false);
        }
    }

    fn handle_big_bang(&mut self, round: RoundNumber) {
        if round <= self.store.last_written_sequence() {
            debug!(round, "BigBang at or below the written head ignored");
            return;
        }
        let actions = self.machine_event(Event::BigBang { round });
        self.process_actions(actions);
        // Messages postponed for the abandoned timeline are void.
        self.postponed.clear();

        let actions =
            self.synchronizer
                .processing_sync(round, true, &*self.store, &*self.transport);
        self.process_sync_actions(actions);
    }

    // ── Consensus actions ──────────────────────────────────────────────

    fn machine_event(&mut self, event: Event) -> Vec<Action> {
        let ctx = Self::ctx(&self.keypair, &*self.store);
        let (_result, actions) = self.machine.handle(&ctx, event);
        actions
    }

    fn ctx<'a>(keypair: &'a KeyPair, store: &'a dyn BlockStore) -> CtxView<'a> {
        let last_written = store.last_written_sequence();
        CtxView {
            keypair,
            last_written,
            previous_hash: store.hash_by_sequence(last_written).unwrap_or(Hash::ZERO),
            now: Instant::now(),
            timestamp_ms: now_ms(),
        }
    }

    fn process_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::StoreBlock { block, sender } => {
                    self.accept_block(block, sender == self.keypair.public);
                }
                Action::SendHash { hash, to } => {
                    if let Ok(payload) = codec::encode_payload(&hash) {
                        self.send_to(MessageKind::BlockHash, payload, &to);
                    }
                }
                Action::BroadcastStage1(stage) => {
                    self.broadcast_payload(MessageKind::FirstStage, &stage);
                }
                Action::BroadcastStage2(stage) => {
                    self.broadcast_payload(MessageKind::SecondStage, &stage);
                }
                Action::BroadcastStage3(stage) => {
                    self.broadcast_payload(MessageKind::ThirdStage, &stage);
                }
                Action::SendStage { kind, to } => self.serve_stage(kind, to),
                Action::RequestStages { kind, from } => {
                    let message_kind = match kind {
                        StageKind::First => MessageKind::FirstStageRequest,
                        StageKind::Second => MessageKind::SecondStageRequest,
                        StageKind::Third => MessageKind::ThirdStageRequest,
                    };
                    let own_index = self.machine.round().my_conf_index.unwrap_or(u8::MAX);
                    for index in from {
                        if let Some(key) = self.confidant_key(index) {
                            if let Ok(payload) = codec::encode_payload(&own_index) {
                                self.send_to(message_kind, payload, &key);
                            }
                        }
                    }
                }
                Action::BroadcastBlock(block) => {
                    if let Ok(payload) = codec::encode_payload(&block) {
                        self.broadcast(MessageKind::NewBlock, payload, true);
                    }
                }
                Action::BroadcastCharacteristic(characteristic) => {
                    self.broadcast_characteristic(characteristic);
                }
                Action::SpawnNextRound(table) => {
                    if let Ok(payload) = codec::encode_payload(&table) {
                        self.broadcast_for_round(MessageKind::RoundTable, payload, table.round);
                    }
                    self.handle_round_table(table);
                }
                Action::RequestRoundInfo { from } => {
                    for index in [from.0, from.1] {
                        if let Some(key) = self.confidant_key(index) {
                            self.send_to(MessageKind::RoundInfoRequest, Vec::new(), &key);
                        }
                    }
                }
            }
        }
    }

    /// Validate, store, and apply a block arriving at the chain head.
    fn accept_block(&mut self, block: Block, own: bool) -> bool {
        let last_written = self.store.last_written_sequence();

        // Nothing written yet: only the shared genesis may enter without
        // a predecessor to validate against.
        let Some(prev) = self.store.load(last_written) else {
            if block.sequence == 0 && self.store.store_block(block, false) {
                self.apply_written_blocks();
                return true;
            }
            warn!("no chain head to validate against");
            return false;
        };

        let report = {
            let ctx = ValidationContext {
                prev_block: &prev,
                store: &*self.store,
                wallets: Some(&self.wallets),
            };
            self.validator.validate(&block, &ctx)
        };

        if report.is_fatal() {
            error!(
                fatal = true,
                sequence = block.sequence,
                "fatal validation failure: consensus participation halted"
            );
            self.halted = true;
            return false;
        }
        if !report.is_acceptable() {
            warn!(
                sequence = block.sequence,
                outcome = ?report.outcome,
                own,
                "block rejected by the validation pipeline"
            );
            // Leave the gap visible so the synchronizer re-fetches the
            // sequence from another neighbour on the next round tick.
            self.store.note_global_sequence(block.sequence);
            return false;
        }

        if self.store.store_block(block, false) {
            self.store.test_cached_blocks();
            self.apply_written_blocks();
            true
        } else {
            false
        }
    }

    /// Apply wallet effects of every written-but-unapplied block and
    /// record the per-wallet block history.
    fn apply_written_blocks(&mut self) {
        while let Some(block) = self.store.load(self.applied_next) {
            if let Err(err) = self.wallets.apply_block(&block) {
                // The block is already part of the chain; an application
                // failure here means replicas disagree on wallet state.
                error!(sequence = block.sequence, %err, "wallet application failed");
            } else {
                let hash = block.hash();
                let mut appearances: HashMap<PublicKey, u32> = HashMap::new();
                for tx in &block.transactions {
                    for address in [&tx.source, &tx.target] {
                        if let Some(key) = self.wallets.ids().resolve(address) {
                            *appearances.entry(key).or_insert(0) += 1;
                        }
                    }
                }
                for (key, count) in appearances {
                    if let Some(id) = self.wallets.ids().lookup_key(&key) {
                        self.pools.record(id, hash, count);
                    }
                }
            }
            self.applied_next += 1;
        }
    }

    // ── Serving peers ──────────────────────────────────────────────────

    fn serve_block_request(&mut self, request: BlockRequestPayload, sender: &PublicKey) {
        let last_written = self.store.last_written_sequence();
        let blocks: Vec<Block> = request
            .sequences
            .iter()
            .filter(|seq| **seq <= last_written)
            .filter_map(|seq| self.store.load(*seq))
            .collect();
        if blocks.is_empty() {
            debug!(%sender, "block request entirely beyond our chain");
            return;
        }
        let reply = BlockReplyPayload {
            packet_id: request.packet_id,
            blocks,
        };
        if let Ok(payload) = codec::encode_payload(&reply) {
            self.send_to(MessageKind::RequestedBlock, payload, sender);
        }
    }

    fn serve_round_table(&mut self, sender: &PublicKey, request_kind: MessageKind) {
        let Some(table) = self.round_table.clone() else {
            debug!(%sender, "no round table to serve");
            return;
        };
        let reply_kind = if request_kind == MessageKind::RoundInfoRequest {
            MessageKind::RoundInfoReply
        } else {
            MessageKind::RoundTable
        };
        if let Ok(payload) = codec::encode_payload(&table) {
            self.send_for_round(reply_kind, payload, sender, table.round);
        }
    }

    fn serve_stage(&mut self, kind: StageKind, to: u8) {
        let Some(key) = self.confidant_key(to) else {
            return;
        };
        let Some(my_index) = self.machine.round().my_conf_index else {
            return;
        };
        let slot = my_index as usize;
        let (message_kind, payload) = match kind {
            StageKind::First => (
                MessageKind::FirstStage,
                self.machine.round().stage1.get(slot).and_then(|s| {
                    s.as_ref().and_then(|stage| codec::encode_payload(stage).ok())
                }),
            ),
            StageKind::Second => (
                MessageKind::SecondStage,
                self.machine.round().stage2.get(slot).and_then(|s| {
                    s.as_ref().and_then(|stage| codec::encode_payload(stage).ok())
                }),
            ),
            StageKind::Third => (
                MessageKind::ThirdStage,
                self.machine.round().stage3.get(slot).and_then(|s| {
                    s.as_ref().and_then(|stage| codec::encode_payload(stage).ok())
                }),
            ),
        };
        if let Some(payload) = payload {
            self.send_to(message_kind, payload, &key);
        }
    }

    fn broadcast_characteristic(&mut self, characteristic: Characteristic) {
        let payload = CharacteristicPayload {
            sequence: characteristic.sequence,
            compressed_mask: codec::compress(&characteristic.mask),
            mask_bits: characteristic.mask_bits,
            timestamp: characteristic.timestamp,
        };
        if let Ok(bytes) = codec::encode_payload(&payload) {
            self.broadcast(MessageKind::NewCharacteristic, bytes, false);
        }
    }

    // ── Sync actions ───────────────────────────────────────────────────

    fn process_sync_actions(&mut self, actions: Vec<SyncAction>) {
        for action in actions {
            match action {
                SyncAction::SendBlockRequest {
                    neighbour_index,
                    sequences,
                    packet_id,
                } => {
                    let Some(info) = self.transport.neighbor_by_index(neighbour_index) else {
                        error!(neighbour_index, "request target is not valid");
                        continue;
                    };
                    let request = BlockRequestPayload {
                        sequences,
                        packet_id,
                    };
                    if let Ok(payload) = codec::encode_payload(&request) {
                        self.send_to(MessageKind::BlockRequest, payload, &info.key);
                    }
                }
                SyncAction::StartTimer { period_ms } => {
                    self.sync_timer = Some((Duration::from_millis(period_ms), Instant::now()));
                }
                SyncAction::StopTimer => {
                    self.sync_timer = None;
                }
                SyncAction::Finished => {
                    info!(last_written = self.store.last_written_sequence(), "sync finished");
                }
            }
        }
    }

    // ── Outbound helpers ───────────────────────────────────────────────

    fn confidant_key(&self, index: u8) -> Option<PublicKey> {
        self.machine.round().confidants.get(index as usize).copied()
    }

    fn next_frame_id(&mut self) -> u64 {
        self.frame_id += 1;
        self.frame_id
    }

    fn send_to(&mut self, kind: MessageKind, payload: Vec<u8>, to: &PublicKey) {
        let round = self.machine.current_round();
        self.send_for_round(kind, payload, to, round);
    }

    fn send_for_round(
        &mut self,
        kind: MessageKind,
        payload: Vec<u8>,
        to: &PublicKey,
        round: RoundNumber,
    ) {
        let frame = Frame::direct(self.next_frame_id(), self.keypair.public, *to, kind, round, payload);
        self.transport.send(frame, to);
    }

    fn broadcast_payload<T: Serialize>(&mut self, kind: MessageKind, value: &T) {
        match codec::encode_payload(value) {
            Ok(payload) => self.broadcast(kind, payload, false),
            Err(err) => error!(%err, "cannot encode broadcast payload"),
        }
    }

    fn broadcast(&mut self, kind: MessageKind, payload: Vec<u8>, compressed: bool) {
        let round = self.machine.current_round();
        self.broadcast_for_round_inner(kind, payload, round, compressed);
    }

    fn broadcast_for_round(&mut self, kind: MessageKind, payload: Vec<u8>, round: RoundNumber) {
        self.broadcast_for_round_inner(kind, payload, round, false);
    }

    fn broadcast_for_round_inner(
        &mut self,
        kind: MessageKind,
        payload: Vec<u8>,
        round: RoundNumber,
        compressed: bool,
    ) {
        let mut frame = Frame::broadcast(self.next_frame_id(), self.keypair.public, kind, round, payload);
        if compressed {
            frame = frame.with_compression();
        }
        self.transport.broadcast(frame);
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
