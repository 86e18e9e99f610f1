//! Public client: typed calls, notifications, async calls, batches, and
//! the driver surface for pumping asynchronous work.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use rill_jsonrpc::codec::{FromJson, ToParams};
use rill_jsonrpc::{protocol, Reactor, Request, RequestId, Response, RpcError};

use crate::session::ClientSession;

/// Applied to each of resolve/connect/write/read unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type LoggerHook = Arc<dyn Fn(&str) + Send + Sync>;
type SharedLogger = Arc<Mutex<Option<LoggerHook>>>;

/// JSON-RPC 2.0 client over HTTP/1.1.
///
/// Every call opens its own TCP connection; there is no pooling between
/// calls. A `Client` is built for single-threaded use: it owns its reactor,
/// and embedders that want concurrency create one client per thread.
pub struct Client {
    host: String,
    port: u16,
    timeout: Duration,
    logger: SharedLogger,
    next_id: AtomicI64,
    reactor: Reactor,
    // Movable between threads but not shareable across them.
    _not_sync: PhantomData<Cell<()>>,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            logger: Arc::new(Mutex::new(None)),
            next_id: AtomicI64::new(1),
            reactor: Reactor::new().expect("failed to build client event loop"),
            _not_sync: PhantomData,
        }
    }

    /// Timeout for each phase of every subsequent call.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Install a hook invoked on recoverable network and parse errors. It
    /// runs on the thread pumping the reactor.
    pub fn set_logger(&self, logger: impl Fn(&str) + Send + Sync + 'static) {
        *self.logger.lock().unwrap() = Some(Arc::new(logger));
    }

    pub fn clear_logger(&self) {
        *self.logger.lock().unwrap() = None;
    }

    /// Synchronous typed call: encode `args` positionally, block until the
    /// response arrives, decode the result as `R`. Error responses and
    /// transport failures both surface as `Err`.
    pub fn call<R, A>(&self, method: &str, args: A) -> Result<R, RpcError>
    where
        R: FromJson,
        A: ToParams,
    {
        let request = Request::new(method, args.to_params(), self.next_id());
        let response = self.call_request(&request)?;
        R::from_json(&response.into_result()?)
    }

    /// Synchronous call with a caller-built request. Useful when the id or
    /// raw params matter.
    pub fn call_request(&self, request: &Request) -> Result<Response, RpcError> {
        let body = protocol::serialize_request(request);
        let session = self.session();
        let (_status, bytes) = self
            .reactor
            .block_on(session.exchange(body))
            .map_err(|err| self.log_error(err))?;
        protocol::parse_response(&bytes)
            .map_err(|err| self.log_error(err))
    }

    /// Send a batch in one round trip. Responses come back in request
    /// order; an all-notification batch yields an empty vector.
    pub fn call_batch(&self, requests: &[Request]) -> Result<Vec<Response>, RpcError> {
        let body = protocol::serialize_batch_request(requests);
        let session = self.session();
        let (_status, bytes) = self
            .reactor
            .block_on(session.exchange(body))
            .map_err(|err| self.log_error(err))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        protocol::parse_batch_response(&bytes)
            .map_err(|err| self.log_error(err))
    }

    /// Fire-and-forget notification. The request goes out without an id and
    /// without waiting for any reply; every failure, connect errors
    /// included, is swallowed (the logger hook still sees it).
    pub fn notify<A: ToParams>(&self, method: &str, args: A) {
        let request = Request::notification(method, args.to_params());
        let body = protocol::serialize_request(&request);
        let session = self.session();
        if let Err(err) = self.reactor.block_on(session.send_only(body)) {
            self.log_error(err);
        }
    }

    /// Asynchronous call. The exchange is posted on the client's reactor
    /// and the callback fires once pumping (`run`, `poll`, `run_for`,
    /// `run_until_idle`) drives it to completion. Failures are delivered as
    /// an error `Response` with a null id, never raised.
    pub fn async_call<A, F>(&self, method: &str, args: A, callback: F)
    where
        A: ToParams,
        F: FnOnce(Response) + Send + 'static,
    {
        let request = Request::new(method, args.to_params(), self.next_id());
        let body = protocol::serialize_request(&request);
        let session = self.session();
        let logger = Arc::clone(&self.logger);
        self.reactor.spawn(async move {
            let response = match session.exchange(body).await {
                Ok((_status, bytes)) => match protocol::parse_response(&bytes) {
                    Ok(response) => response,
                    Err(err) => {
                        log_hook(&logger, &err);
                        Response::failure(err, RequestId::Null)
                    }
                },
                Err(err) => {
                    log_hook(&logger, &err);
                    Response::failure(err, RequestId::Null)
                }
            };
            callback(response);
        });
    }

    /// Block until every outstanding asynchronous call has completed.
    /// Returns the number of completions processed.
    pub fn run(&self) -> usize {
        self.reactor.run()
    }

    /// Process ready completions without blocking; returns the count.
    pub fn poll(&self) -> usize {
        self.reactor.poll()
    }

    /// Drive the loop for at most `duration`; returns the completions
    /// processed in the window.
    pub fn run_for(&self, duration: Duration) -> usize {
        self.reactor.run_for(duration)
    }

    /// Poll until nothing more is ready. Does not wait for new I/O.
    pub fn run_until_idle(&self) -> usize {
        self.reactor.run_until_idle()
    }

    /// The underlying driver, for embedders integrating their own work.
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn session(&self) -> ClientSession {
        ClientSession::new(&self.host, self.port, self.timeout)
    }

    fn log_error(&self, err: RpcError) -> RpcError {
        log_hook(&self.logger, &err);
        err
    }
}

fn log_hook(logger: &SharedLogger, err: &RpcError) {
    let message = err.to_string();
    warn!("{message}");
    let hook = logger.lock().unwrap().clone();
    if let Some(hook) = hook {
        hook(&message);
    }
}
