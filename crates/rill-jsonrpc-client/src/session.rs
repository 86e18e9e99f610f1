//! Per-call HTTP session.
//!
//! Each call walks resolve → connect → write → read with the configured
//! timeout applied to every phase, then closes the connection. Failures
//! surface as `InternalError` values whose message starts with
//! `network error:` followed by the phase and cause.

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request as HttpRequest, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use rill_jsonrpc::RpcError;

pub(crate) const USER_AGENT_STRING: &str = "jsonrpc-client";

fn network_error(phase: &str, cause: impl fmt::Display) -> RpcError {
    RpcError::internal(format!("network error: {phase}: {cause}"))
}

/// One HTTP exchange against one server. Built fresh for every call and
/// dropped when the call completes.
pub(crate) struct ClientSession {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ClientSession {
    pub(crate) fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout,
        }
    }

    fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply the per-phase timeout to one step of the pipeline.
    async fn bounded<T, E>(
        &self,
        phase: &str,
        step: impl std::future::Future<Output = Result<T, E>>,
    ) -> Result<T, RpcError>
    where
        E: fmt::Display,
    {
        match timeout(self.timeout, step).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(network_error(phase, err)),
            Err(_) => Err(network_error(phase, "timed out")),
        }
    }

    async fn connect(&self) -> Result<TcpStream, RpcError> {
        let authority = self.authority();
        let addr = self
            .bounded("resolve", async {
                lookup_host(authority.as_str()).await?.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
                })
            })
            .await?;
        debug!("connecting to {addr}");
        self.bounded("connect", TcpStream::connect(addr)).await
    }

    /// Full request/response exchange. Returns the HTTP status and raw body.
    pub(crate) async fn exchange(&self, body: String) -> Result<(StatusCode, Bytes), RpcError> {
        let stream = self.connect().await?;
        let (mut sender, connection) = self
            .bounded("connect", http1::handshake(TokioIo::new(stream)))
            .await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!("client connection task ended: {err}");
            }
        });

        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/")
            .header(HOST, self.authority())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, USER_AGENT_STRING)
            .body(Full::new(Bytes::from(body)))
            .map_err(|err| network_error("request", err))?;

        // send_request transmits the request and resolves on the response
        // head, so the read deadline covers the server's processing time.
        let response = self.bounded("read", sender.send_request(request)).await?;
        let status = response.status();
        let body = self
            .bounded("read", response.into_body().collect())
            .await?
            .to_bytes();

        // Dropping the sender closes our side of the connection.
        Ok((status, body))
    }

    /// Write-only exchange for notifications: send the request, flush,
    /// shut the socket down, and never read the reply.
    pub(crate) async fn send_only(&self, body: String) -> Result<(), RpcError> {
        let mut stream = self.connect().await?;
        let head = format!(
            "POST / HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/json\r\n\
             User-Agent: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            self.authority(),
            USER_AGENT_STRING,
            body.len()
        );
        self.bounded("write", async {
            let mut framed = head.into_bytes();
            framed.extend_from_slice(body.as_bytes());
            stream.write_all(&framed).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
    }
}
