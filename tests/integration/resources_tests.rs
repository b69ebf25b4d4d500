//! The built-in `board` and `application` resources over mock ports.

use sensorwatcher::rpc::client::{PathSegment, Response, read_response, write_request};
use sensorwatcher::rpc::engine::{Method, Postman, Status};
use sensorwatcher::rpc::pack::{Kind, Pack, PackError};
use sensorwatcher::rpc::value::Value;

use crate::mock_ports::{NOW, device};

fn request<F>(postman: &mut Postman, method: Method, path: &str, body: F) -> Response
where
    F: FnOnce(&mut Pack<'_>) -> Result<(), PackError>,
{
    let mut buf = vec![0u8; 1024];
    let len = write_request(&mut buf, method, 0x31, &[PathSegment::Name(path)], body, None).unwrap();
    let out = postman.handle(&mut buf, len, NOW, None);
    read_response(&mut buf, out).unwrap()
}

fn get(postman: &mut Postman, path: &str) -> Value {
    let response = request(postman, Method::Get, path, |w| w.put_none());
    assert_eq!(response.status, Status::Content);
    response.body.unwrap()
}

fn put(postman: &mut Postman, path: &str, entries: &[(&str, Value)]) -> Status {
    let body = Value::Map(
        entries
            .iter()
            .map(|(k, v)| (Value::from(*k), v.clone()))
            .collect(),
    );
    request(postman, Method::Put, path, |w| body.write_to(w)).status
}

// ── board ─────────────────────────────────────────────────────

#[test]
fn board_get_reports_identity_and_settings() {
    let (mut postman, _settings) = device();
    let board = get(&mut postman, "board");

    assert_eq!(board.get("id"), Some(&Value::from("1A2B3C4D5E6F7788")));
    assert_eq!(board.get("processor"), Some(&Value::from("ESP32-S3")));
    assert_eq!(board.get("flash_size"), Some(&Value::Int(8192)));
    assert_eq!(board.get("model"), Some(&Value::from("")));
    assert_eq!(board.get("log_level"), Some(&Value::Int(3)));
}

#[test]
fn board_put_updates_model_and_log_level() {
    let (mut postman, settings) = device();
    let status = put(
        &mut postman,
        "board",
        &[
            ("model", "m5stack_atoms3".into()),
            ("log_level", Value::Int(4)),
        ],
    );
    assert_eq!(status, Status::Changed);

    let saved = settings.port().last_saved().unwrap();
    assert_eq!(saved.board_model_label(), "m5stack_atoms3");
    assert_eq!(saved.log_level, 4);

    let board = get(&mut postman, "board");
    assert_eq!(board.get("model"), Some(&Value::from("m5stack_atoms3")));
    assert_eq!(board.get("log_level"), Some(&Value::Int(4)));
}

#[test]
fn board_put_skips_unknown_keys() {
    let (mut postman, settings) = device();
    let status = put(
        &mut postman,
        "board",
        &[
            ("colour", Value::List(vec![Value::Int(1), Value::Int(2)])),
            ("model", "generic".into()),
        ],
    );
    assert_eq!(status, Status::Changed);
    assert_eq!(settings.read(|c| c.board_model_label()), "generic");
}

#[test]
fn board_put_rejects_unknown_model() {
    let (mut postman, settings) = device();
    let status = put(&mut postman, "board", &[("model", "raspberry_pi".into())]);
    assert_eq!(status, Status::BadRequest);
    assert_eq!(settings.port().save_count(), 0);
}

#[test]
fn board_put_rejects_out_of_range_log_level() {
    let (mut postman, settings) = device();
    assert_eq!(
        put(&mut postman, "board", &[("log_level", Value::Int(6))]),
        Status::BadRequest
    );
    assert_eq!(
        put(&mut postman, "board", &[("log_level", Value::Int(-1))]),
        Status::BadRequest
    );
    assert_eq!(settings.read(|c| c.log_level), 3);
}

#[test]
fn board_put_with_non_map_body_is_bad_request() {
    let (mut postman, _settings) = device();
    let response = request(&mut postman, Method::Put, "board", |w| w.put_integer(1));
    assert_eq!(response.status, Status::BadRequest);
}

#[test]
fn board_rejects_other_methods() {
    let (mut postman, _settings) = device();
    let response = request(&mut postman, Method::Delete, "board", |w| w.put_none());
    assert_eq!(response.status, Status::MethodNotAllowed);
    let response = request(&mut postman, Method::Post, "board", |w| {
        w.create_container(Kind::Map)?;
        w.finish_container()
    });
    assert_eq!(response.status, Status::MethodNotAllowed);
}

#[test]
fn board_put_persist_failure_is_internal_error() {
    let (mut postman, settings) = device();
    settings.port().fail.set(true);
    let status = put(&mut postman, "board", &[("log_level", Value::Int(1))]);
    assert_eq!(status, Status::InternalServerError);
    assert_eq!(settings.read(|c| c.log_level), 3);
}

// ── application ───────────────────────────────────────────────

#[test]
fn application_get_reports_identity_clock_and_settings() {
    let (mut postman, _settings) = device();
    let app = get(&mut postman, "application");

    assert_eq!(app.get("id"), Some(&Value::from("com.movoki.sensor_watcher")));
    assert_eq!(app.get("name"), Some(&Value::from("SensorWatcher")));
    assert_eq!(app.get("version"), Some(&Value::Int(0x000C)));
    assert_eq!(app.get("free_heap"), Some(&Value::Int(200_000)));
    assert_eq!(app.get("minimum_free_heap"), Some(&Value::Int(150_000)));
    assert_eq!(app.get("time"), Some(&Value::BigInt(NOW)));
    assert_eq!(app.get("up_time"), Some(&Value::Int(42)));
    assert_eq!(app.get("sampling_period"), Some(&Value::Int(600)));
    assert_eq!(app.get("queue"), Some(&Value::Bool(false)));
    assert_eq!(app.get("diagnostics"), Some(&Value::Bool(false)));
    assert_eq!(app.get("sleep"), Some(&Value::Bool(false)));
}

#[test]
fn application_put_updates_sampling_settings() {
    let (mut postman, settings) = device();
    let status = put(
        &mut postman,
        "application",
        &[
            ("sampling_period", Value::Int(60)),
            ("queue", Value::Bool(true)),
            ("firmware", "ignored".into()),
            ("sleep", Value::Bool(true)),
        ],
    );
    assert_eq!(status, Status::Changed);

    let saved = settings.port().last_saved().unwrap();
    assert_eq!(saved.sampling_period_secs, 60);
    assert!(saved.queue);
    assert!(!saved.diagnostics);
    assert!(saved.sleep);

    let app = get(&mut postman, "application");
    assert_eq!(app.get("sampling_period"), Some(&Value::Int(60)));
    assert_eq!(app.get("queue"), Some(&Value::Bool(true)));
}

#[test]
fn application_put_rejects_wrong_kinds() {
    let (mut postman, settings) = device();
    assert_eq!(
        put(&mut postman, "application", &[("queue", Value::Int(1))]),
        Status::BadRequest
    );
    assert_eq!(
        put(&mut postman, "application", &[("sampling_period", Value::Int(-5))]),
        Status::BadRequest
    );
    assert_eq!(settings.port().save_count(), 0);
}

#[test]
fn application_put_persist_failure_is_internal_error() {
    let (mut postman, settings) = device();
    settings.port().fail.set(true);
    let status = put(&mut postman, "application", &[("diagnostics", Value::Bool(true))]);
    assert_eq!(status, Status::InternalServerError);
    assert!(!settings.read(|c| c.diagnostics));
}

#[test]
fn index_lists_built_in_resources() {
    let (mut postman, _settings) = device();
    let mut buf = vec![0u8; 256];
    let len = write_request(&mut buf, Method::Get, 2, &[], |w| w.put_none(), None).unwrap();
    let out = postman.handle(&mut buf, len, NOW, None);
    let response = read_response(&mut buf, out).unwrap();
    assert_eq!(response.status, Status::Content);
    assert_eq!(
        response.body,
        Some(Value::List(vec![
            "board".into(),
            "application".into(),
            "measurements".into(),
            "logs".into(),
        ]))
    );
}
