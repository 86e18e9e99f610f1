//! Arithmetic JSON-RPC server.
//!
//! Run with `cargo run --example calculator_server`, then point the
//! client-side examples at 127.0.0.1:8080.

use std::net::SocketAddr;
use std::time::Duration;

use rill_jsonrpc_server::{RpcError, Server};

fn main() -> rill_jsonrpc_server::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server = Server::new(SocketAddr::from(([127, 0, 0, 1], 8080)));

    server.register_method("add", |a: i64, b: i64| a + b);
    server.register_method("subtract", |a: i64, b: i64| a - b);
    server.register_method("multiply", |a: i64, b: i64| a * b);
    server.register_method("divide", |a: f64, b: f64| -> Result<f64, RpcError> {
        if b == 0.0 {
            Err(RpcError::server_error(-32000, "division by zero"))
        } else {
            Ok(a / b)
        }
    });
    server.register_method("delay", |millis: i64| {
        std::thread::sleep(Duration::from_millis(millis as u64));
        millis
    });
    server.register_method("log", |message: String| {
        println!("[notification] {message}");
    });

    println!("calculator server listening on 127.0.0.1:8080");
    server.run()
}
