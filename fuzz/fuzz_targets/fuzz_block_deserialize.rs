#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Bincode payload bodies come straight off the wire.
    let _ = conclave_messages::decode_payload::<conclave_ledger::Block>(data);
    let _ = conclave_messages::decode_payload::<conclave_ledger::Transaction>(data);
    let _ = conclave_messages::decode_payload::<conclave_ledger::TransactionsPacket>(data);
});
