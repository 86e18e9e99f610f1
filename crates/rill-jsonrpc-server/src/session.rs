//! Per-connection HTTP session.
//!
//! One `Session` serves one keep-alive connection: hyper drives the HTTP
//! framing and connection reuse, this module applies the transport rules
//! (POST only, JSON only, 30-second read inactivity deadline) and routes
//! bodies through the protocol engine and the method registry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request as HttpRequest, Response as HttpResponse};
use hyper_util::rt::{TokioIo, TokioTimer};
use serde_json::Value;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use rill_jsonrpc::{protocol, MethodRegistry, RequestId, RpcError};

use crate::responses;

/// Inactivity deadline for reading the next request on a connection. On
/// expiry the session closes without an error to the peer.
pub(crate) const READ_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) type LoggerHook = Arc<dyn Fn(&str) + Send + Sync>;
pub(crate) type SharedLogger = Arc<Mutex<Option<LoggerHook>>>;

pub(crate) struct Session {
    registry: Arc<MethodRegistry>,
    logger: SharedLogger,
}

impl Session {
    pub(crate) fn new(registry: Arc<MethodRegistry>, logger: SharedLogger) -> Self {
        Self { registry, logger }
    }

    /// Serve one connection until the peer closes, the inactivity deadline
    /// expires, or a non-recoverable error ends it.
    pub(crate) async fn serve(self, stream: TcpStream) {
        let io = TokioIo::new(stream);
        let session = Arc::new(self);
        let service = service_fn(move |request| {
            let session = Arc::clone(&session);
            async move { Ok::<_, hyper::Error>(session.handle(request).await) }
        });

        let connection = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(READ_INACTIVITY_TIMEOUT)
            .keep_alive(true)
            .serve_connection(io, service);

        if let Err(err) = connection.await {
            // Covers idle keep-alive timeouts and peers dropping mid-request.
            debug!("connection closed: {err}");
        }
    }

    async fn handle(&self, request: HttpRequest<Incoming>) -> HttpResponse<responses::Body> {
        if request.method() != Method::POST {
            self.log(&format!(
                "rejected {} request: only POST is accepted",
                request.method()
            ));
            return responses::method_not_allowed();
        }

        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !content_type.contains("application/json") {
            self.log(&format!(
                "rejected request with content type '{content_type}'"
            ));
            return responses::unsupported_media_type();
        }

        let body = match request.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                self.log(&format!("failed to read request body: {err}"));
                return responses::rpc_error(
                    RpcError::parse_error(format!("failed to read request body: {err}")),
                    RequestId::Null,
                );
            }
        };

        self.dispatch(&body).await
    }

    async fn dispatch(&self, body: &Bytes) -> HttpResponse<responses::Body> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                self.log(&format!("request body is not valid JSON: {err}"));
                return responses::rpc_error(
                    RpcError::parse_error(format!("invalid JSON: {err}")),
                    RequestId::Null,
                );
            }
        };

        // Remembered before parsing: a batch of one still answers with an
        // array, and a lone request never does.
        let is_batch = protocol::is_batch_request(&value);

        let requests = match protocol::parse_request_value(&value) {
            Ok(requests) => requests,
            Err(err) => {
                self.log(&format!("invalid request envelope: {err}"));
                let id = protocol::recover_id(&value);
                return responses::rpc_error(err, id);
            }
        };

        if is_batch {
            debug!(requests = requests.len(), "dispatching batch");
            let replies = self.registry.invoke_batch(requests).await;
            if replies.is_empty() {
                responses::no_content()
            } else {
                responses::json(protocol::serialize_batch_response(&replies))
            }
        } else {
            let request = &requests[0];
            debug!(method = request.method(), "dispatching request");
            // Single invocations run inline on the reactor thread.
            let reply = self.registry.invoke(request);
            if request.has_id() {
                responses::json(protocol::serialize_response(&reply))
            } else {
                responses::no_content()
            }
        }
    }

    fn log(&self, message: &str) {
        warn!("{message}");
        let hook = self.logger.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(message);
        }
    }
}
