//! Fuzz target: `Value::read_from` over arbitrary words.
//!
//! Walks the root container of an arbitrary buffer, decoding every element
//! it can. Decoding may fail but must never panic or read out of bounds,
//! and whatever decodes must encode back within twice the words it took.
//!
//! cargo fuzz run fuzz_pack_reader

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensorwatcher::rpc::pack::{Pack, WORD, cells};
use sensorwatcher::rpc::value::Value;

fuzz_target!(|data: &[u8]| {
    let mut input = data.to_vec();
    input.truncate(input.len() / WORD * WORD);
    let words = input.len() / WORD;

    let mut decoded = Vec::new();
    {
        let buf = cells(&mut input);
        let mut reader = Pack::new(buf, words);
        while reader.next() {
            let length = reader.element_length();
            if let Ok(value) = Value::read_from(&mut reader) {
                decoded.push((value, length));
            }
        }
    }

    for (value, length) in decoded {
        let mut out = vec![0u8; 2 * words * WORD];
        let buf = cells(&mut out);
        let mut writer = Pack::new(buf, 2 * words);
        // An unterminated string gains one word for its NUL; everything
        // else re-encodes no larger than it was read.
        value.write_to(&mut writer).expect("fits twice the input element");
        assert!(writer.offset() <= 2 * length);
    }
});
