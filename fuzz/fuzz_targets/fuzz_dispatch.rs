//! Fuzz target: `Postman::handle`
//!
//! Feeds arbitrary request buffers to a postman with one resource that
//! walks its sub-path and body. The response must always fit the buffer
//! and start with a decodable status word.
//!
//! cargo fuzz run fuzz_dispatch

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensorwatcher::rpc::client::read_response_head;
use sensorwatcher::rpc::engine::{Postman, Status};
use sensorwatcher::rpc::pack::WORD;
use sensorwatcher::rpc::value::Value;

fuzz_target!(|data: &[u8]| {
    let mut buffer = data.to_vec();
    buffer.truncate(buffer.len() / WORD * WORD);
    if buffer.len() < 2 * WORD {
        return;
    }
    let length = buffer.len();

    let mut postman = Postman::new();
    postman
        .register_fn("echo", |_, reader, writer| {
            while reader.next() {}
            if reader.close().is_err() || !reader.next() {
                return Status::BadRequest;
            }
            match Value::read_from(reader).and_then(|v| v.write_to(writer)) {
                Ok(()) => Status::Content,
                Err(_) => Status::BadRequest,
            }
        })
        .expect("empty registry");

    let out = postman.handle(&mut buffer, length, 1_700_000_000, None);
    assert!(out >= 2 * WORD && out <= length && out % WORD == 0);
    assert!(read_response_head(&buffer[..out]).is_ok());
});
