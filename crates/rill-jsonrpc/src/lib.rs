//! # Core JSON-RPC 2.0 building blocks
//!
//! Transport-free JSON-RPC 2.0 implementation shared by the HTTP server and
//! client crates. This crate owns the protocol itself: envelope types, the
//! error taxonomy, the value codec that maps JSON onto native types, the
//! stateless parse/serialize engine, the typed method registry with its batch
//! worker pool, and the reactor driver that pumps per-endpoint I/O.
//!
//! ## Layout
//!
//! - [`types`]: `Request`, `Response`, `RequestId` envelopes
//! - [`error`]: `RpcError` and the JSON-RPC 2.0 error code taxonomy
//! - [`codec`]: `ToJson`/`FromJson` conversions and tuple parameter extraction
//! - [`protocol`]: pure parse/serialize functions, batch detection
//! - [`registry`]: typed procedure table and the batch dispatcher
//! - [`reactor`]: single-threaded driver (`run`, `poll`, `run_for`, `run_until_idle`)

pub mod codec;
pub mod error;
pub mod protocol;
pub mod reactor;
pub mod registry;
pub mod types;

// Re-export main types
pub use codec::{FromJson, FromParams, ToJson, ToParams};
pub use error::{ErrorCode, RpcError};
pub use reactor::Reactor;
pub use registry::{Handler, MethodRegistry};
pub use types::{Request, RequestId, Response};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
