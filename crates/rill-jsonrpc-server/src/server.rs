//! Server lifecycle: bind, accept, serve, stop, restart.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use rill_jsonrpc::registry::Handler;
use rill_jsonrpc::{MethodRegistry, Reactor};

use crate::session::{Session, SharedLogger};

#[derive(Debug, Error)]
pub enum ServerError {
    /// The operation is not valid in the server's current lifecycle state.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// JSON-RPC 2.0 server over HTTP/1.1.
///
/// Procedures register by `(name, callable)`; the server accepts `POST`
/// requests with `Content-Type: application/json` and answers on the same
/// connection, honoring keep-alive. `run` blocks the calling thread;
/// `start` serves from a background thread until `stop`.
pub struct Server {
    addr: SocketAddr,
    registry: Arc<MethodRegistry>,
    logger: SharedLogger,
    running: Arc<AtomicBool>,
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
    lifecycle: Mutex<Lifecycle>,
}

struct Lifecycle {
    shutdown: watch::Sender<bool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Server {
    /// Create a server that will listen on `addr`. Nothing is bound until
    /// `run` or `start`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            registry: Arc::new(MethodRegistry::new()),
            logger: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: Arc::new(Mutex::new(None)),
            lifecycle: Mutex::new(Lifecycle {
                shutdown: watch::channel(false).0,
                thread: None,
            }),
        }
    }

    /// Register a procedure. Any `Fn` of arity 0..=8 whose parameters
    /// decode from JSON and whose return value encodes to JSON (or is a
    /// `Result` of one) qualifies. Registering a name twice keeps the
    /// second procedure.
    pub fn register_method<Args, Ret, H>(&self, name: impl Into<String>, handler: H)
    where
        H: Handler<Args, Ret>,
        Args: 'static,
        Ret: 'static,
    {
        self.registry.register(name, handler);
    }

    /// Install a hook invoked on recoverable I/O and parse errors. Runs on
    /// the reactor thread.
    pub fn set_logger(&self, logger: impl Fn(&str) + Send + Sync + 'static) {
        *self.logger.lock().unwrap() = Some(Arc::new(logger));
    }

    pub fn clear_logger(&self) {
        *self.logger.lock().unwrap() = None;
    }

    /// Resize the batch worker pool. Only legal while the server is
    /// stopped: the pool teardown drains and joins the previous workers.
    pub fn set_batch_concurrency(&self, threads: usize) -> crate::Result<()> {
        if self.is_running() {
            return Err(ServerError::IllegalState(
                "cannot resize the batch pool while the server is running",
            ));
        }
        self.registry.set_batch_concurrency(threads);
        Ok(())
    }

    pub fn batch_concurrency(&self) -> usize {
        self.registry.batch_concurrency()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The address actually bound, once running. With port 0 this is where
    /// the ephemeral port shows up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap()
    }

    /// Serve on the calling thread until `stop` is invoked from elsewhere.
    pub fn run(&self) -> crate::Result<()> {
        let shutdown_rx = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(ServerError::IllegalState("server is already running"));
            }
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            lifecycle.shutdown = shutdown_tx;
            shutdown_rx
        };

        let _guard = RunningGuard(&self.running);
        serve_loop(
            self.addr,
            Arc::clone(&self.registry),
            Arc::clone(&self.logger),
            Arc::clone(&self.local_addr),
            shutdown_rx,
            None,
        )
    }

    /// Serve from a background thread. Returns once the listener is bound,
    /// so callers may connect immediately; bind failures surface here.
    pub fn start(&self) -> crate::Result<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::IllegalState("server is already running"));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        lifecycle.shutdown = shutdown_tx;

        let (ready_tx, ready_rx) = mpsc::channel::<io::Result<()>>();
        let addr = self.addr;
        let registry = Arc::clone(&self.registry);
        let logger = Arc::clone(&self.logger);
        let running = Arc::clone(&self.running);
        let local_addr = Arc::clone(&self.local_addr);

        let spawned = thread::Builder::new()
            .name("rill-jsonrpc-server".to_string())
            .spawn(move || {
                let _guard = RunningGuard(&running);
                let result = serve_loop(
                    addr,
                    registry,
                    logger,
                    local_addr,
                    shutdown_rx,
                    Some(ready_tx),
                );
                if let Err(err) = result {
                    error!("server loop exited with error: {err}");
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };
        lifecycle.thread = Some(handle);
        drop(lifecycle);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.stop();
                Err(err.into())
            }
            Err(_) => {
                self.stop();
                Err(ServerError::IllegalState(
                    "server thread exited before binding",
                ))
            }
        }
    }

    /// Stop accepting, tear down open sessions, and join the background
    /// thread if one is serving. Idempotent; the server may be started
    /// again afterwards.
    pub fn stop(&self) {
        let thread = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            // The accept loop treats this as its clean shutdown sentinel.
            let _ = lifecycle.shutdown.send(true);
            lifecycle.thread.take()
        };
        if let Some(handle) = thread {
            if handle.join().is_err() {
                error!("server thread panicked during shutdown");
            }
        }
        *self.local_addr.lock().unwrap() = None;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn serve_loop(
    addr: SocketAddr,
    registry: Arc<MethodRegistry>,
    logger: SharedLogger,
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
    mut shutdown: watch::Receiver<bool>,
    ready: Option<mpsc::Sender<io::Result<()>>>,
) -> crate::Result<()> {
    let reactor = match Reactor::new() {
        Ok(reactor) => reactor,
        Err(err) => {
            if let Some(ready) = ready {
                let _ = ready.send(Err(err));
                return Ok(());
            }
            return Err(err.into());
        }
    };

    let outcome = reactor.block_on(async {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                if let Some(ready) = &ready {
                    let _ = ready.send(Err(err));
                    return Ok(());
                }
                return Err(ServerError::Io(err));
            }
        };

        let bound = listener.local_addr()?;
        *local_addr.lock().unwrap() = Some(bound);
        if let Some(ready) = &ready {
            let _ = ready.send(Ok(()));
        }
        info!("JSON-RPC server listening on {bound}");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("accept loop shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!("accepted connection from {peer}");
                            let session = Session::new(
                                Arc::clone(&registry),
                                Arc::clone(&logger),
                            );
                            reactor.spawn(session.serve(stream));
                        }
                        Err(err) => {
                            warn!("accept failed: {err}");
                            let hook = logger.lock().unwrap().clone();
                            if let Some(hook) = hook {
                                hook(&format!("accept failed: {err}"));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    });

    // Dropping the reactor tears down any session still in flight.
    drop(reactor);
    outcome
}
