//! The `measurements` and `logs` resources and measurement notifications.

use sensorwatcher::app::measurements::{MEASUREMENTS_MAX, Measurement, sample_diagnostics};
use sensorwatcher::rpc::auth::{Credentials, KEY_LENGTH, Key};
use sensorwatcher::rpc::client::{PathSegment, Response, read_response, verify_response, write_request};
use sensorwatcher::rpc::engine::{Method, Postman, Status};
use sensorwatcher::resources::measurements::{entry_notification, queue_notification};
use sensorwatcher::rpc::value::Value;

use crate::mock_ports::{DEVICE_ID, NOW, fixture};

fn call(postman: &mut Postman, method: Method, path: &str, buffer: usize) -> Response {
    let mut buf = vec![0u8; buffer];
    let len = write_request(&mut buf, method, 0x51, &[PathSegment::Name(path)], |w| w.put_none(), None)
        .unwrap();
    let out = postman.handle(&mut buf, len, NOW, None);
    read_response(&mut buf, out).unwrap()
}

fn row(metric: &str, unit: &str, value: f32) -> Value {
    Value::List(vec![
        format!("1A2B3C4D5E6F7788_application_{metric}").as_str().into(),
        Value::BigInt(NOW),
        unit.into(),
        Value::Float(value),
    ])
}

// ── measurements ──────────────────────────────────────────────

#[test]
fn measurements_start_empty() {
    let mut device = fixture();
    let response = call(&mut device.postman, Method::Get, "measurements", 256);
    assert_eq!(response.status, Status::Content);
    assert_eq!(response.body, Some(Value::List(vec![])));
}

#[test]
fn diagnostics_samples_are_served_oldest_first() {
    let mut device = fixture();
    let s = &device.services;
    assert_eq!(sample_diagnostics(&s.measurements, &s.clock, &s.platform, false), 2);

    let response = call(&mut device.postman, Method::Get, "measurements", 512);
    assert_eq!(response.status, Status::Content);
    assert_eq!(
        response.body,
        Some(Value::List(vec![
            row("UpTime", "s", 42.0),
            row("MinimumFreeHeap", "B", 150_000.0),
        ]))
    );
}

#[test]
fn measurements_are_read_only() {
    let mut device = fixture();
    let response = call(&mut device.postman, Method::Put, "measurements", 256);
    assert_eq!(response.status, Status::MethodNotAllowed);
    let response = call(&mut device.postman, Method::Delete, "measurements", 256);
    assert_eq!(response.status, Status::MethodNotAllowed);
}

#[test]
fn queue_larger_than_the_packet_is_internal_error() {
    let mut device = fixture();
    for i in 0..MEASUREMENTS_MAX {
        let m = Measurement::new(DEVICE_ID, "adc", "Voltage", NOW, "V", i as f32);
        assert!(device.services.measurements.append(m, false));
    }
    let response = call(&mut device.postman, Method::Get, "measurements", 256);
    assert_eq!(response.status, Status::InternalServerError);
    assert_eq!(response.body, None);
}

#[test]
fn queue_notification_is_signed_with_the_backend_key() {
    let device = fixture();
    let s = &device.services;
    sample_diagnostics(&s.measurements, &s.clock, &s.platform, true);

    let key = Key::new([0x5A; KEY_LENGTH]);
    let credentials = Credentials {
        id: "backend",
        key: &key,
    };
    let mut buf = vec![0u8; 512];
    let len = queue_notification(&mut buf, &s.measurements, NOW, Some(credentials)).unwrap();

    assert_eq!(verify_response(&mut buf, len, &key, NOW), Ok(()));
    let message = read_response(&mut buf, len).unwrap();
    assert_eq!(message.status, Status::Content);
    assert_eq!(message.token, 0);
    assert_eq!(message.path, Value::List(vec!["measurements".into()]));
    assert_eq!(
        message.body,
        Some(Value::List(vec![
            row("UpTime", "s", 42.0),
            row("MinimumFreeHeap", "B", 150_000.0),
        ]))
    );
    assert_eq!(message.signed_by, Some((NOW, "backend".to_string())));
}

#[test]
fn entry_notification_wraps_one_row() {
    let m = Measurement::new(DEVICE_ID, "application", "UpTime", NOW, "s", 7.0);
    let mut buf = vec![0u8; 256];
    let len = entry_notification(&mut buf, &m, NOW, None).unwrap();
    let message = read_response(&mut buf, len).unwrap();
    assert_eq!(message.body, Some(Value::List(vec![row("UpTime", "s", 7.0)])));
    assert_eq!(message.signed_by, None);
}

#[test]
fn notification_that_does_not_fit_fails() {
    let device = fixture();
    let s = &device.services;
    sample_diagnostics(&s.measurements, &s.clock, &s.platform, false);
    let mut buf = vec![0u8; 32];
    assert!(queue_notification(&mut buf, &s.measurements, NOW, None).is_err());
}

// ── logs ──────────────────────────────────────────────────────

#[test]
fn logs_serve_captured_lines() {
    let mut device = fixture();
    device.services.logs.push("I board: model 'generic', log level 3");
    device.services.logs.push("W postman: token 000031 -> NotFound");

    let response = call(&mut device.postman, Method::Get, "logs", 512);
    assert_eq!(response.status, Status::Content);
    assert_eq!(
        response.body,
        Some(Value::List(vec![
            "I board: model 'generic', log level 3".into(),
            "W postman: token 000031 -> NotFound".into(),
        ]))
    );
}

#[test]
fn logs_are_read_only() {
    let mut device = fixture();
    let response = call(&mut device.postman, Method::Post, "logs", 256);
    assert_eq!(response.status, Status::MethodNotAllowed);
}
