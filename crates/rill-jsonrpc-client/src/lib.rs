//! # JSON-RPC 2.0 client over HTTP/1.1
//!
//! Issues synchronous calls, fire-and-forget notifications, asynchronous
//! calls with callback delivery, and batch requests. Every call opens its
//! own short-lived HTTP session; asynchronous work makes progress only
//! while the embedder pumps the client's reactor (`run`, `poll`, `run_for`,
//! `run_until_idle`).
//!
//! ```no_run
//! use rill_jsonrpc_client::Client;
//!
//! let client = Client::new("127.0.0.1", 8080);
//! let sum: i64 = client.call("add", (10i64, 20i64)).unwrap();
//! assert_eq!(sum, 30);
//! ```

mod client;
mod session;

pub use client::{Client, DEFAULT_TIMEOUT};

// Re-export the protocol surface embedders touch when building batches and
// inspecting responses.
pub use rill_jsonrpc::{ErrorCode, Request, RequestId, Response, RpcError};
