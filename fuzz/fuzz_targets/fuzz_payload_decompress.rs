#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The declared-size bound must hold whatever the stream claims.
    if let Ok(inflated) = conclave_messages::codec::decompress(data, 1 << 16) {
        assert!(inflated.len() <= 1 << 16);
    }
});
