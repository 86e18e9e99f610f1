//! Wire-level tests: raw sockets, exact envelopes, HTTP status taxonomy.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rill_jsonrpc_server::Server;
use serde_json::{json, Value};

fn spawn_server(configure: impl FnOnce(&Server)) -> (Server, SocketAddr) {
    let server = Server::new(SocketAddr::from(([127, 0, 0, 1], 0)));
    configure(&server);
    server.start().expect("server should start");
    let addr = server.local_addr().expect("server should be bound");
    (server, addr)
}

fn arithmetic_server() -> (Server, SocketAddr, Arc<AtomicUsize>) {
    let log_calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&log_calls);
    let (server, addr) = spawn_server(move |server| {
        server.register_method("add", |a: i64, b: i64| a + b);
        server.register_method("multiply", |a: i64, b: i64| a * b);
        server.register_method("log", move |_message: String| {
            observed.fetch_add(1, Ordering::SeqCst);
        });
    });
    (server, addr, log_calls)
}

/// Send one raw request and read until the server closes the connection.
fn raw_exchange(addr: SocketAddr, request: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    stream.write_all(request.as_bytes()).expect("write");

    let mut raw = String::new();
    stream.read_to_string(&mut raw).expect("read");

    let status: u16 = raw
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("status line");
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

fn post(addr: SocketAddr, body: &str) -> (u16, String) {
    let request = format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    raw_exchange(addr, &request)
}

/// Read one framed response off a keep-alive connection.
fn read_response(reader: &mut BufReader<&TcpStream>) -> (u16, String) {
    let mut status_line = String::new();
    reader.read_line(&mut status_line).expect("status line");
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status code");

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header line");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().expect("content length");
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("body");
    (status, String::from_utf8(body).expect("utf8 body"))
}

#[test]
fn basic_call_returns_exact_envelope() {
    let (server, addr, _) = arithmetic_server();

    let (status, body) = post(addr, r#"{"jsonrpc":"2.0","method":"add","params":[10,20],"id":1}"#);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": 30, "id": 1}));

    server.stop();
}

#[test]
fn unknown_method_answers_in_band() {
    let (server, addr, _) = arithmetic_server();

    let (status, body) = post(addr, r#"{"jsonrpc":"2.0","method":"nope","params":[],"id":7}"#);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["id"], 7);

    server.stop();
}

#[test]
fn malformed_json_answers_parse_error_with_null_id() {
    let (server, addr, _) = arithmetic_server();

    let (status, body) = post(addr, r#"{"jsonrpc":"2.0","method":"x","#);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);

    server.stop();
}

#[test]
fn notification_gets_204_and_still_executes() {
    let (server, addr, log_calls) = arithmetic_server();

    let (status, body) = post(addr, r#"{"jsonrpc":"2.0","method":"log","params":["hi"]}"#);
    assert_eq!(status, 204);
    assert!(body.is_empty());
    // Single notifications run inline before the response is written.
    assert_eq!(log_calls.load(Ordering::SeqCst), 1);

    server.stop();
}

#[test]
fn batch_with_notification_preserves_order_and_drops_it() {
    let (server, addr, log_calls) = arithmetic_server();

    let batch = r#"[
        {"jsonrpc":"2.0","method":"add","params":[5,5],"id":1},
        {"jsonrpc":"2.0","method":"log","params":["x"]},
        {"jsonrpc":"2.0","method":"multiply","params":[2,3],"id":2}
    ]"#;
    let (status, body) = post(addr, batch);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    let responses = body.as_array().expect("batch response is an array");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"], 10);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["result"], 6);
    assert_eq!(responses[1]["id"], 2);

    // The notification ran exactly once even though it produced no response.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while log_calls.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(log_calls.load(Ordering::SeqCst), 1);

    server.stop();
}

#[test]
fn single_element_batch_still_answers_with_an_array() {
    let (server, addr, _) = arithmetic_server();

    let (status, body) = post(addr, r#"[{"jsonrpc":"2.0","method":"add","params":[1,2],"id":1}]"#);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    let responses = body.as_array().expect("array envelope for array input");
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["result"], 3);

    server.stop();
}

#[test]
fn all_notification_batch_gets_204() {
    let (server, addr, log_calls) = arithmetic_server();

    let batch = r#"[
        {"jsonrpc":"2.0","method":"log","params":["a"]},
        {"jsonrpc":"2.0","method":"log","params":["b"]}
    ]"#;
    let (status, body) = post(addr, batch);
    assert_eq!(status, 204);
    assert!(body.is_empty());

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while log_calls.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(log_calls.load(Ordering::SeqCst), 2);

    server.stop();
}

#[test]
fn empty_batch_is_rejected_in_band() {
    let (server, addr, _) = arithmetic_server();

    let (status, body) = post(addr, "[]");
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], Value::Null);

    server.stop();
}

#[test]
fn null_id_is_a_full_request() {
    let (server, addr, _) = arithmetic_server();

    let (status, body) = post(
        addr,
        r#"{"jsonrpc":"2.0","method":"add","params":[1,2],"id":null}"#,
    );
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["result"], 3);
    assert_eq!(body["id"], Value::Null);

    server.stop();
}

#[test]
fn invalid_envelope_recovers_the_id() {
    let (server, addr, _) = arithmetic_server();

    // method is a number: structurally invalid, but the id is recoverable
    let (status, body) = post(addr, r#"{"jsonrpc":"2.0","method":5,"id":9}"#);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 9);

    server.stop();
}

#[test]
fn get_is_rejected_with_405_and_logged() {
    let logs = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&logs);
    let (server, addr) = spawn_server(move |server| {
        server.register_method("add", |a: i64, b: i64| a + b);
        server.set_logger(move |message| sink.lock().unwrap().push(message.to_string()));
    });

    let (status, body) = raw_exchange(
        addr,
        "GET / HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
    );
    assert_eq!(status, 405);
    assert!(!body.is_empty());

    let logs = logs.lock().unwrap();
    assert!(!logs.is_empty());
    assert!(logs[0].contains("GET"));

    server.stop();
}

#[test]
fn wrong_content_type_is_rejected_with_415() {
    let logs = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&logs);
    let (server, addr) = spawn_server(move |server| {
        server.register_method("add", |a: i64, b: i64| a + b);
        server.set_logger(move |message| sink.lock().unwrap().push(message.to_string()));
    });

    let body = r#"{"jsonrpc":"2.0","method":"add","params":[1,2],"id":1}"#;
    let request = format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: text/plain\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let (status, _) = raw_exchange(addr, &request);
    assert_eq!(status, 415);
    assert!(!logs.lock().unwrap().is_empty());

    server.stop();
}

#[test]
fn content_type_with_charset_parameter_is_accepted() {
    let (server, addr, _) = arithmetic_server();

    let body = r#"{"jsonrpc":"2.0","method":"add","params":[2,3],"id":1}"#;
    let request = format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\n\
         Content-Type: application/json; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let (status, body) = raw_exchange(addr, &request);
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["result"], 5);

    server.stop();
}

#[test]
fn keep_alive_serves_requests_in_order_on_one_connection() {
    let (server, addr, _) = arithmetic_server();

    let stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let mut reader = BufReader::new(&stream);

    for i in 0..5i64 {
        let body = format!(
            r#"{{"jsonrpc":"2.0","method":"add","params":[{i},1],"id":{i}}}"#
        );
        let request = format!(
            "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        (&stream).write_all(request.as_bytes()).expect("write");

        let (status, body) = read_response(&mut reader);
        assert_eq!(status, 200);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["result"], i + 1);
        assert_eq!(body["id"], i);
    }

    server.stop();
}
