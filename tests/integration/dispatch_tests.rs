//! Routing through `Postman::handle` with closure resources.

use sensorwatcher::rpc::client::{PathSegment, read_response, read_response_head, write_request};
use sensorwatcher::rpc::engine::{Method, Postman, Status, build_notification};
use sensorwatcher::rpc::pack::{Kind, Pack, WORD};
use sensorwatcher::rpc::value::Value;

const BUFFER: usize = 512;

fn call(postman: &mut Postman, method: Method, token: u32, path: &[PathSegment<'_>]) -> (Vec<u8>, usize) {
    let mut buf = vec![0u8; BUFFER];
    let len = write_request(&mut buf, method, token, path, |w| w.put_none(), None).unwrap();
    let out = postman.handle(&mut buf, len, 0, None);
    (buf, out)
}

fn word(buf: &[u8], index: usize) -> u32 {
    u32::from_le_bytes(buf[index * WORD..(index + 1) * WORD].try_into().unwrap())
}

#[test]
fn board_scenario_starts_with_content_word_then_map() {
    let mut postman = Postman::new();
    postman
        .register_fn("board", |_, _, writer: &mut Pack<'_>| {
            let written = writer.create_container(Kind::Map).and_then(|()| {
                writer.put_string("id")?;
                writer.put_string("1A2B3C4D5E6F7788")?;
                writer.finish_container()
            });
            match written {
                Ok(()) => Status::Content,
                Err(_) => Status::InternalServerError,
            }
        })
        .unwrap();

    let (mut buf, out) = call(&mut postman, Method::Get, 1, &[PathSegment::Name("board")]);

    assert_eq!(word(&buf, 0), Kind::Integer.tag() | 1);
    assert_eq!(word(&buf, 1), 0x2500_0001);

    let response = read_response(&mut buf, out).unwrap();
    assert_eq!(response.status, Status::Content);
    assert_eq!(response.token, 1);
    assert_eq!(response.path, Value::List(vec!["board".into()]));
    assert_eq!(
        response.body,
        Some(Value::Map(vec![("id".into(), "1A2B3C4D5E6F7788".into())]))
    );
    assert_eq!(response.signed_by, None);
}

#[test]
fn registered_path_returns_handler_status() {
    let mut postman = Postman::new();
    postman.register_fn("wifi", |_, _, _| Status::Changed).unwrap();
    postman.register_fn("board", |_, _, _| Status::Content).unwrap();

    let (buf, out) = call(&mut postman, Method::Get, 9, &[PathSegment::Name("wifi")]);
    let head = read_response_head(&buf[..out]).unwrap();
    assert_eq!(head.status, Status::Changed);
    assert_eq!(head.token, 9);
}

#[test]
fn unknown_path_is_not_found() {
    let mut postman = Postman::new();
    postman.register_fn("wifi", |_, _, _| Status::Content).unwrap();

    let (buf, out) = call(&mut postman, Method::Get, 3, &[PathSegment::Name("unknown")]);
    assert_eq!(out, 2 * WORD);
    assert_eq!(read_response_head(&buf[..out]).unwrap().status, Status::NotFound);
}

#[test]
fn post_on_empty_path_is_not_allowed() {
    let mut postman = Postman::new();
    postman.register_fn("wifi", |_, _, _| Status::Content).unwrap();

    let (buf, out) = call(&mut postman, Method::Post, 4, &[]);
    assert_eq!(out, 2 * WORD);
    assert_eq!(
        read_response_head(&buf[..out]).unwrap().status,
        Status::MethodNotAllowed
    );
}

#[test]
fn handler_sees_method_and_sub_path() {
    let mut postman = Postman::new();
    postman
        .register_fn("sensors", |method, reader: &mut Pack<'_>, _| {
            if method != Method::Delete || !reader.next() {
                return Status::BadRequest;
            }
            match reader.get_integer() {
                Ok(2) => Status::Deleted,
                _ => Status::NotFound,
            }
        })
        .unwrap();

    let path = [PathSegment::Name("sensors"), PathSegment::Index(2)];
    let (buf, out) = call(&mut postman, Method::Delete, 5, &path);
    assert_eq!(read_response_head(&buf[..out]).unwrap().status, Status::Deleted);

    let path = [PathSegment::Name("sensors"), PathSegment::Index(7)];
    let (buf, out) = call(&mut postman, Method::Delete, 6, &path);
    assert_eq!(read_response_head(&buf[..out]).unwrap().status, Status::NotFound);
}

#[test]
fn handler_reads_request_body() {
    let mut postman = Postman::new();
    postman
        .register_fn("echo", |_, reader: &mut Pack<'_>, writer: &mut Pack<'_>| {
            if reader.close().is_err() || !reader.next() {
                return Status::BadRequest;
            }
            match Value::read_from(reader).and_then(|v| v.write_to(writer)) {
                Ok(()) => Status::Content,
                Err(_) => Status::BadRequest,
            }
        })
        .unwrap();

    let mut buf = vec![0u8; BUFFER];
    let body = Value::List(vec![Value::Int(-5), Value::Double(2.5), "x".into()]);
    let len = write_request(
        &mut buf,
        Method::Post,
        11,
        &[PathSegment::Name("echo")],
        |w| body.write_to(w),
        None,
    )
    .unwrap();
    let out = postman.handle(&mut buf, len, 0, None);

    let response = read_response(&mut buf, out).unwrap();
    assert_eq!(response.status, Status::Content);
    assert_eq!(response.body, Some(body));
}

#[test]
fn response_that_does_not_fit_is_internal_error() {
    let mut postman = Postman::new();
    postman
        .register_fn("big", |_, _, writer: &mut Pack<'_>| {
            match writer.put_binary(&[0xAA; 256]) {
                Ok(()) => Status::Content,
                Err(_) => Status::InternalServerError,
            }
        })
        .unwrap();

    let mut buf = vec![0u8; 64];
    let len = write_request(&mut buf, Method::Get, 12, &[PathSegment::Name("big")], |w| w.put_none(), None)
        .unwrap();
    let out = postman.handle(&mut buf, len, 0, None);
    assert_eq!(out, 2 * WORD);
    assert_eq!(
        read_response_head(&buf[..out]).unwrap().status,
        Status::InternalServerError
    );
}

#[test]
fn notification_reads_back_as_content() {
    let mut buf = vec![0u8; BUFFER];
    let len = build_notification(
        &mut buf,
        "measurements",
        |w| {
            w.create_container(Kind::List)?;
            w.put_float(21.5)?;
            w.finish_container()
        },
        0,
        None,
    )
    .unwrap();

    let response = read_response(&mut buf, len).unwrap();
    assert_eq!(response.status, Status::Content);
    assert_eq!(response.token, 0);
    assert_eq!(response.path, Value::List(vec!["measurements".into()]));
    assert_eq!(response.body, Some(Value::List(vec![Value::Float(21.5)])));
}

#[test]
fn empty_request_buffer_is_bad_request() {
    let mut postman = Postman::new();
    let mut buf = vec![0u8; BUFFER];
    let out = postman.handle(&mut buf, 0, 0, None);
    assert_eq!(out, 2 * WORD);
    let head = read_response_head(&buf[..out]).unwrap();
    assert_eq!(head.status, Status::BadRequest);
    assert_eq!(head.token, 0);
}
