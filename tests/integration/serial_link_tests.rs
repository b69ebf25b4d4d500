//! `SerialLink` end to end over an in-memory UART.

use std::collections::VecDeque;

use sensorwatcher::rpc::client::{PathSegment, Response, read_response, write_request};
use sensorwatcher::rpc::codec::{DELIMITER, FrameDecoder, encode_frame};
use sensorwatcher::rpc::engine::{Method, PACKET_LENGTH_MAX, Status};
use sensorwatcher::rpc::transport::{SerialLink, Transport};
use sensorwatcher::rpc::value::Value;

use crate::mock_ports::{NOW, device};

#[derive(Default)]
struct MemoryUart {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    flushes: usize,
}

impl Transport for MemoryUart {
    type Error = std::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            let Some(byte) = self.rx.pop_front() else {
                break;
            };
            buf[n] = byte;
            n += 1;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

fn framed_get(token: u32, path: &str) -> Vec<u8> {
    let mut payload = [0u8; 128];
    let len = write_request(
        &mut payload,
        Method::Get,
        token,
        &[PathSegment::Name(path)],
        |w| w.put_none(),
        None,
    )
    .unwrap();
    let mut frame = vec![0u8; 2 * (len + 4) + 2];
    let n = encode_frame(&payload[..len], &mut frame).unwrap();
    frame.truncate(n);
    frame
}

/// Decode every frame written to the UART.
fn responses(tx: &[u8]) -> Vec<Response> {
    let mut decoder = FrameDecoder::<2048>::new();
    let mut out = Vec::new();
    let mut rest = tx;
    while !rest.is_empty() {
        let (used, frame) = decoder.feed(rest);
        if let Some(payload) = frame {
            let mut payload = payload.to_vec();
            let len = payload.len();
            out.push(read_response(&mut payload, len).unwrap());
        }
        rest = &rest[used..];
    }
    out
}

#[test]
fn serves_board_over_serial() {
    let (mut postman, _settings) = device();
    let mut buffer = vec![0u8; PACKET_LENGTH_MAX];
    let mut uart = MemoryUart::default();
    uart.rx.extend(framed_get(0x10, "board"));
    let mut link = SerialLink::new(uart, &mut buffer);

    assert!(link.poll(&mut postman, NOW).unwrap());

    let tx = &link.transport().tx;
    assert_eq!(tx.first(), Some(&DELIMITER));
    assert_eq!(tx.last(), Some(&DELIMITER));
    assert_eq!(link.transport().flushes, 1);

    let replies = responses(tx);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::Content);
    assert_eq!(replies[0].token, 0x10);
    let body = replies[0].body.as_ref().unwrap();
    assert_eq!(body.get("id"), Some(&Value::from("1A2B3C4D5E6F7788")));
}

#[test]
fn back_to_back_requests_are_answered_in_order() {
    let (mut postman, _settings) = device();
    let mut buffer = vec![0u8; PACKET_LENGTH_MAX];
    let mut uart = MemoryUart::default();
    uart.rx.extend(framed_get(1, "board"));
    uart.rx.extend(framed_get(2, "application"));
    uart.rx.extend(framed_get(3, "nothing"));
    let mut link = SerialLink::new(uart, &mut buffer);

    while !link.transport().rx.is_empty() {
        link.poll(&mut postman, NOW).unwrap();
    }

    let replies = responses(&link.transport().tx);
    let heads: Vec<_> = replies.iter().map(|r| (r.token, r.status)).collect();
    assert_eq!(
        heads,
        vec![
            (1, Status::Content),
            (2, Status::Content),
            (3, Status::NotFound),
        ]
    );
}

#[test]
fn corrupted_frame_gets_no_reply() {
    let (mut postman, _settings) = device();
    let mut buffer = vec![0u8; PACKET_LENGTH_MAX];
    let mut uart = MemoryUart::default();
    let mut frame = framed_get(4, "board");
    frame[3] ^= 0x01;
    uart.rx.extend(frame);
    let mut link = SerialLink::new(uart, &mut buffer);

    assert!(!link.poll(&mut postman, NOW).unwrap());
    assert!(link.transport().tx.is_empty());

    // The link recovers on the next good frame.
    link.transport_mut().rx.extend(framed_get(5, "board"));
    assert!(link.poll(&mut postman, NOW).unwrap());
    let replies = responses(&link.transport().tx);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].token, 5);
}

#[test]
fn frame_larger_than_buffer_is_dropped() {
    let (mut postman, _settings) = device();
    let mut buffer = vec![0u8; 16];
    let mut uart = MemoryUart::default();
    uart.rx.extend(framed_get(6, "application"));
    let mut link = SerialLink::new(uart, &mut buffer);

    while !link.transport().rx.is_empty() {
        assert!(!link.poll(&mut postman, NOW).unwrap());
    }
    assert!(link.transport().tx.is_empty());
}

#[test]
fn empty_frame_is_answered_with_bad_request() {
    let (mut postman, _settings) = device();
    let mut buffer = vec![0u8; PACKET_LENGTH_MAX];
    let mut uart = MemoryUart::default();
    let mut frame = [0u8; 16];
    let n = encode_frame(&[], &mut frame).unwrap();
    uart.rx.extend(&frame[..n]);
    // Shorter than a CRC: never reaches the postman.
    uart.rx.extend([DELIMITER, 0x01, 0x02, 0x03, DELIMITER]);
    let mut link = SerialLink::new(uart, &mut buffer);

    while !link.transport().rx.is_empty() {
        link.poll(&mut postman, NOW).unwrap();
    }

    let replies = responses(&link.transport().tx);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::BadRequest);
    assert_eq!(replies[0].token, 0);
    assert_eq!(replies[0].body, None);
}
