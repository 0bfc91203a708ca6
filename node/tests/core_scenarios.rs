//! End-to-end scenarios over the assembled node core: a full consensus
//! round across three confidants, BigBang resets, postpone/replay, fatal
//! chain breaks, and the read-only service after a halt. Frames travel
//! through a scripted in-memory transport; nodes are driven synchronously
//! by shuttling captured frames between them.

use conclave_consensus::{RoundTable, StateTag};
use conclave_crypto::{keypair_from_seed, sign_message};
use conclave_ledger::Block;
use conclave_messages::{codec, Frame, MessageKind};
use conclave_node::{
    BlockRequestPayload, CoreNode, NeighborInfo, NodeConfig, Transport,
};
use conclave_store::MemoryBlockStore;
use conclave_types::{
    Hash, KeyPair, PublicKey, Signature, UserField, UserFields, TIMESTAMP_FIELD,
};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Captures everything a node sends so the test can shuttle it onward.
#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<(Frame, PublicKey)>>,
    broadcasts: Mutex<Vec<Frame>>,
    neighbours: Mutex<Vec<NeighborInfo>>,
}

impl MockTransport {
    fn drain(&self) -> (Vec<(Frame, PublicKey)>, Vec<Frame>) {
        let sent = std::mem::take(&mut *self.sent.lock().unwrap());
        let broadcasts = std::mem::take(&mut *self.broadcasts.lock().unwrap());
        (sent, broadcasts)
    }

    fn set_neighbours(&self, neighbours: Vec<NeighborInfo>) {
        *self.neighbours.lock().unwrap() = neighbours;
    }
}

impl Transport for MockTransport {
    fn send(&self, frame: Frame, to: &PublicKey) {
        self.sent.lock().unwrap().push((frame, *to));
    }

    fn broadcast(&self, frame: Frame) {
        self.broadcasts.lock().unwrap().push(frame);
    }

    fn neighbor_count(&self) -> usize {
        self.neighbours.lock().unwrap().len()
    }

    fn neighbor_by_index(&self, index: u8) -> Option<NeighborInfo> {
        self.neighbours.lock().unwrap().get(index as usize).cloned()
    }

    fn clear_tasks(&self) {}
}

struct TestNode {
    node: CoreNode,
    transport: Arc<MockTransport>,
}

fn keypairs(n: u8) -> Vec<KeyPair> {
    (0..n).map(|i| keypair_from_seed(&[i + 10; 32])).collect()
}

fn genesis_block(confidants: Vec<PublicKey>) -> Block {
    let mut fields = UserFields::new();
    fields.insert(TIMESTAMP_FIELD, UserField::Text("1000".into()));
    Block::build(0, Hash::ZERO, confidants, Vec::new(), fields)
}

fn make_node(keypair: KeyPair, genesis: Block) -> TestNode {
    let transport = Arc::new(MockTransport::default());
    let config = NodeConfig::default();
    let mut node = CoreNode::new(
        &config,
        keypair,
        Box::new(MemoryBlockStore::new()),
        Arc::clone(&transport) as Arc<dyn Transport>,
    );
    node.bootstrap_genesis(genesis);
    TestNode { node, transport }
}

fn round_table_frame(sender: PublicKey, table: &RoundTable) -> Frame {
    Frame::broadcast(
        1,
        sender,
        MessageKind::RoundTable,
        table.round,
        codec::encode_payload(table).unwrap(),
    )
}

/// Deliver every captured frame to its recipients until the network goes
/// quiet.
fn pump(nodes: &mut [TestNode]) {
    for _ in 0..64 {
        let mut deliveries: Vec<(usize, Frame)> = Vec::new();
        for i in 0..nodes.len() {
            let (sent, broadcasts) = nodes[i].transport.drain();
            for (frame, to) in sent {
                if let Some(j) = nodes.iter().position(|n| n.node.my_key() == to) {
                    deliveries.push((j, frame));
                }
            }
            for frame in broadcasts {
                for j in 0..nodes.len() {
                    if j != i {
                        deliveries.push((j, frame.clone()));
                    }
                }
            }
        }
        if deliveries.is_empty() {
            return;
        }
        for (j, frame) in deliveries {
            nodes[j].node.on_frame(frame);
        }
    }
    panic!("network did not go quiet");
}

// ---------------------------------------------------------------------------
// 1. Happy-path round
// ---------------------------------------------------------------------------

#[test]
fn happy_path_round_produces_a_block_on_every_node() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());

    let mut nodes: Vec<TestNode> = keys
        .into_iter()
        .map(|kp| make_node(kp, genesis.clone()))
        .collect();

    // The general is the (outside) announcer; all three nodes sit in the
    // trusted set.
    let announcer = keypair_from_seed(&[99u8; 32]).public;
    let table = RoundTable {
        round: 1,
        general: announcer,
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    for test_node in nodes.iter_mut() {
        test_node.node.on_frame(round_table_frame(announcer, &table));
        assert_eq!(test_node.node.state(), StateTag::Trusted);
    }

    pump(&mut nodes);

    // The round converged: every node wrote block 1, and the writer's
    // next-round announcement moved everyone to round 2.
    for test_node in &nodes {
        assert_eq!(test_node.node.last_written(), 1, "block 1 accepted");
        assert_eq!(test_node.node.current_round(), 2);
    }
    // The round-1 writer opened round 2 as its general, so it sits in
    // Normal while the other two are already Trusted for round 2.
    assert_eq!(
        nodes
            .iter()
            .filter(|n| n.node.state() == StateTag::Trusted)
            .count(),
        2
    );
    assert_eq!(
        nodes
            .iter()
            .filter(|n| n.node.state() == StateTag::Normal)
            .count(),
        1
    );
}

// ---------------------------------------------------------------------------
// 2. BigBang reset
// ---------------------------------------------------------------------------

#[test]
fn big_bang_resets_state_and_round() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());
    let mut test_node = make_node(keypair_from_seed(&[10u8; 32]), genesis);

    let table = RoundTable {
        round: 10,
        general: confidants[1],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    test_node.node.handle_round_table(table);
    assert_eq!(test_node.node.state(), StateTag::Trusted);
    assert_eq!(test_node.node.current_round(), 10);

    // Park a message for a future round, then reset.
    let future = Frame::broadcast(
        7,
        confidants[1],
        MessageKind::FirstStage,
        12,
        vec![1, 2, 3],
    );
    test_node.node.on_frame(future);
    assert_eq!(test_node.node.postponed_len(), 1);

    let big_bang = Frame::broadcast(8, confidants[1], MessageKind::BigBang, 15, Vec::new());
    test_node.node.on_frame(big_bang);

    assert_eq!(test_node.node.state(), StateTag::NoState);
    assert_eq!(test_node.node.current_round(), 15);
    // Postponed messages from the abandoned timeline were dropped.
    assert_eq!(test_node.node.postponed_len(), 0);
}

// ---------------------------------------------------------------------------
// 3. Postpone and replay
// ---------------------------------------------------------------------------

#[test]
fn future_round_block_postponed_then_replayed() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());

    let observer = keypair_from_seed(&[77u8; 32]);
    let mut test_node = make_node(observer, genesis.clone());

    let table_11 = RoundTable {
        round: 11,
        general: confidants[0],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    test_node.node.handle_round_table(table_11);
    assert_eq!(test_node.node.current_round(), 11);

    // A valid block 1 signed by confidant 0 arrives tagged for round 12.
    let signer = keypairs(3).remove(0);
    let mut fields = UserFields::new();
    fields.insert(TIMESTAMP_FIELD, UserField::Text("2000".into()));
    let mut block = Block::build(1, genesis.hash(), confidants.clone(), Vec::new(), fields);
    block.real_trusted_mask = 0b001;
    let digest = block.hash();
    block
        .signatures
        .push(sign_message(digest.as_bytes(), &signer.private).unwrap());

    let frame = Frame::broadcast(
        9,
        confidants[0],
        MessageKind::NewBlock,
        12,
        codec::encode_payload(&block).unwrap(),
    );
    test_node.node.on_frame(frame);

    // Not processed yet: parked for round 12.
    assert_eq!(test_node.node.last_written(), 0);
    assert_eq!(test_node.node.postponed_len(), 1);

    let table_12 = RoundTable {
        round: 12,
        general: confidants[0],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    test_node.node.handle_round_table(table_12);

    // Entering round 12 replayed the block and it was accepted.
    assert_eq!(test_node.node.postponed_len(), 0);
    assert_eq!(test_node.node.last_written(), 1);
}

// ---------------------------------------------------------------------------
// 4. Hash-break rejection
// ---------------------------------------------------------------------------

#[test]
fn hash_break_is_fatal_but_reads_survive() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());

    let observer = keypair_from_seed(&[78u8; 32]);
    let mut test_node = make_node(observer, genesis.clone());

    let table = RoundTable {
        round: 1,
        general: confidants[0],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    test_node.node.handle_round_table(table);

    // Block 1 with a zeroed previous hash against a non-empty chain.
    let mut fields = UserFields::new();
    fields.insert(TIMESTAMP_FIELD, UserField::Text("2000".into()));
    let mut block = Block::build(1, Hash::ZERO, confidants.clone(), Vec::new(), fields);
    block.real_trusted_mask = 0b001;
    let digest = block.hash();
    block
        .signatures
        .push(sign_message(digest.as_bytes(), &keys[0].private).unwrap());

    let frame = Frame::broadcast(
        3,
        confidants[0],
        MessageKind::NewBlock,
        1,
        codec::encode_payload(&block).unwrap(),
    );
    test_node.node.on_frame(frame);

    assert!(test_node.node.is_halted());
    assert_eq!(test_node.node.last_written(), 0, "no storage mutation");

    // Consensus input is refused now …
    let table_2 = round_table_frame(
        confidants[0],
        &RoundTable {
            round: 2,
            general: confidants[0],
            confidants: confidants.clone(),
            hashes: Vec::new(),
        },
    );
    test_node.node.on_frame(table_2);
    assert_eq!(test_node.node.current_round(), 1);

    // … but block requests are still served.
    let request = BlockRequestPayload {
        sequences: vec![0],
        packet_id: 1,
    };
    let request_frame = Frame::direct(
        4,
        confidants[1],
        test_node.node.my_key(),
        MessageKind::BlockRequest,
        1,
        codec::encode_payload(&request).unwrap(),
    );
    test_node.node.on_frame(request_frame);

    let (sent, _) = test_node.transport.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.kind, MessageKind::RequestedBlock);
    assert_eq!(sent[0].1, confidants[1]);
}

// ---------------------------------------------------------------------------
// 5. Round-policy idempotence
// ---------------------------------------------------------------------------

#[test]
fn duplicate_round_table_delivery_is_a_no_op() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());
    let mut test_node = make_node(keypair_from_seed(&[10u8; 32]), genesis);

    let table = RoundTable {
        round: 5,
        general: confidants[0],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    let frame = round_table_frame(confidants[1], &table);

    test_node.node.on_frame(frame.clone());
    let state_after_first = test_node.node.state();
    let round_after_first = test_node.node.current_round();
    test_node.transport.drain();

    // The same table again: dropped by the round policy, no new traffic.
    test_node.node.on_frame(frame);
    assert_eq!(test_node.node.state(), state_after_first);
    assert_eq!(test_node.node.current_round(), round_after_first);
    let (sent, broadcasts) = test_node.transport.drain();
    assert!(sent.is_empty());
    assert!(broadcasts.is_empty());
}

// ---------------------------------------------------------------------------
// 6. Wallet effects of an accepted block
// ---------------------------------------------------------------------------

#[test]
fn accepted_transfer_updates_wallets_and_history() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());

    let observer = keypair_from_seed(&[79u8; 32]);
    let mut test_node = make_node(observer, genesis.clone());

    let table = RoundTable {
        round: 1,
        general: confidants[0],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    test_node.node.handle_round_table(table);

    let alice = keypair_from_seed(&[60u8; 32]).public;
    let bob = keypair_from_seed(&[61u8; 32]).public;
    let transfer = conclave_ledger::Transaction {
        inner_id: 1,
        source: conclave_types::Address::Key(alice),
        target: conclave_types::Address::Key(bob),
        amount: conclave_types::Amount::from_integral(40),
        fee: conclave_types::Amount::from_integral(1),
        signature: Signature([0u8; 64]),
        user_fields: UserFields::new(),
    };

    let mut fields = UserFields::new();
    fields.insert(TIMESTAMP_FIELD, UserField::Text("2000".into()));
    let mut block = Block::build(1, genesis.hash(), confidants.clone(), vec![transfer], fields);
    block.real_trusted_mask = 0b001;
    let digest = block.hash();
    block
        .signatures
        .push(sign_message(digest.as_bytes(), &keys[0].private).unwrap());

    let frame = Frame::broadcast(
        5,
        confidants[0],
        MessageKind::NewBlock,
        1,
        codec::encode_payload(&block).unwrap(),
    );
    test_node.node.on_frame(frame);

    assert_eq!(test_node.node.last_written(), 1);
    let wallets = test_node.node.wallets();
    assert_eq!(
        wallets.find(&bob).unwrap().balance,
        conclave_types::Amount::from_integral(40)
    );
    assert_eq!(
        wallets.find(&alice).unwrap().balance,
        conclave_types::Amount::from_integral(-41)
    );
    assert!(!wallets.find(&alice).unwrap().tail.is_allowed(1));

    // Both wallets remember the block they appeared in.
    let alice_id = wallets.ids().lookup_key(&alice).unwrap();
    assert_eq!(test_node.node.pools().history_len(alice_id), 1);
}

// ---------------------------------------------------------------------------
// 7. Sync against a serving peer
// ---------------------------------------------------------------------------

#[test]
fn lagging_node_catches_up_from_a_peer() {
    let keys = keypairs(3);
    let confidants: Vec<PublicKey> = keys.iter().map(|kp| kp.public).collect();
    let genesis = genesis_block(confidants.clone());

    // The serving peer holds blocks 0..=5.
    let server_keypair = keypair_from_seed(&[80u8; 32]);
    let server_key = server_keypair.public;
    let mut server = make_node(server_keypair, genesis.clone());
    let mut prev_hash = genesis.hash();
    for seq in 1..=5u64 {
        let mut fields = UserFields::new();
        fields.insert(
            TIMESTAMP_FIELD,
            UserField::Text((1000 + seq as i64).to_string()),
        );
        let mut block = Block::build(seq, prev_hash, confidants.clone(), Vec::new(), fields);
        block.real_trusted_mask = 0b001;
        let digest = block.hash();
        block
            .signatures
            .push(sign_message(digest.as_bytes(), &keys[0].private).unwrap());
        prev_hash = block.hash();

        let frame = Frame::broadcast(
            100 + seq,
            confidants[0],
            MessageKind::NewBlock,
            0,
            codec::encode_payload(&block).unwrap(),
        );
        server.node.on_frame(frame);
    }
    assert_eq!(server.node.last_written(), 5);
    server.transport.drain();

    let table = RoundTable {
        round: 6,
        general: confidants[0],
        confidants: confidants.clone(),
        hashes: Vec::new(),
    };
    // The server follows the round so it accepts requests tagged with it.
    server.node.handle_round_table(table.clone());

    // The lagging node knows the server as its only neighbour.
    let lagging_keypair = keypair_from_seed(&[81u8; 32]);
    let mut lagging = make_node(lagging_keypair, genesis);
    lagging.transport.set_neighbours(vec![NeighborInfo {
        key: server_key,
        is_signal: false,
        last_sequence: 5,
    }]);

    // Round 6 announced: the gap (head 0, round 6) starts the sync.
    lagging.node.handle_round_table(table);

    let mut all = vec![server, lagging];
    pump(&mut all);

    assert_eq!(all[1].node.last_written(), 5, "lagging node caught up");
}
