//! # JSON-RPC 2.0 server over HTTP/1.1
//!
//! Hosts typed, user-registered procedures behind an HTTP POST endpoint.
//! Connections are keep-alive sessions with a 30-second inactivity deadline;
//! single requests run inline on the server's reactor thread while batches
//! fan out over the registry's worker pool, preserving response order and
//! suppressing responses for notifications.
//!
//! ```no_run
//! use rill_jsonrpc_server::Server;
//!
//! let server = Server::new(([127, 0, 0, 1], 8080).into());
//! server.register_method("add", |a: i64, b: i64| a + b);
//! server.run().unwrap();
//! ```

mod responses;
mod server;
mod session;

pub use server::{Server, ServerError};

// Re-export the protocol surface embedders touch when registering methods
// and inspecting errors.
pub use rill_jsonrpc::{ErrorCode, Request, RequestId, Response, RpcError};

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, ServerError>;
