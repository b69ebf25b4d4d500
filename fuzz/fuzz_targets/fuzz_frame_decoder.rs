//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder and
//! asserts that it never panics, never returns a payload larger than its
//! buffer, and that every payload it accepts re-encodes to a frame that
//! decodes to the same bytes.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensorwatcher::rpc::codec::{FrameDecoder, encode_frame};

const CAPACITY: usize = 256;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::<CAPACITY>::new();
    let mut rest = data;

    while !rest.is_empty() {
        let (used, payload) = decoder.feed(rest);
        assert!(used > 0 && used <= rest.len(), "feed must make progress");
        if let Some(payload) = payload {
            assert!(payload.len() <= CAPACITY, "payload exceeds decoder buffer");

            let payload = payload.to_vec();
            let mut wire = vec![0u8; 2 * (payload.len() + 4) + 2];
            let n = encode_frame(&payload, &mut wire).expect("worst-case sized");
            let mut check = FrameDecoder::<CAPACITY>::new();
            let (_, again) = check.feed(&wire[..n]);
            assert_eq!(again, Some(payload.as_slice()));
        }
        rest = &rest[used..];
    }

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    let _ = decoder.feed(data);
});
