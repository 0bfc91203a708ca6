#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the frame decoder. When they do
    // decode, re-encoding must round-trip.
    if let Ok(frame) = conclave_messages::Frame::decode(data) {
        let encoded = frame.encode();
        let again = conclave_messages::Frame::decode(&encoded).expect("re-decode");
        assert_eq!(frame, again);
    }
});
