//! Method registry and batch dispatcher.
//!
//! Procedures register under a name with an arbitrary typed signature;
//! argument decoding and return encoding go through the [`codec`] so a
//! plain `Fn(i64, i64) -> i64` closure is a complete procedure. Single
//! invocations run inline on the caller's thread; batches fan out over a
//! bounded worker pool owned by the registry.
//!
//! [`codec`]: crate::codec

use std::collections::HashMap;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::runtime;
use tracing::{debug, warn};

use crate::codec::{FromParams, ToJson};
use crate::error::RpcError;
use crate::types::{Request, Response};

/// Typed procedure signature accepted by [`MethodRegistry::register`].
///
/// Implemented for `Fn` closures of arity 0..=8 whose parameters decode via
/// `FromJson` and whose return value is either a `ToJson` type or a
/// `Result<T, RpcError>`. The `Ret` marker ([`ValueReturn`]/[`ResultReturn`])
/// keeps the two return shapes from overlapping; it is inferred at the
/// registration call site and never written out.
pub trait Handler<Args, Ret>: Send + Sync + 'static {
    fn invoke(&self, params: &Value) -> Result<Value, RpcError>;
}

/// Marker for procedures returning a plain value.
pub struct ValueReturn<R>(PhantomData<R>);

/// Marker for procedures returning `Result<R, RpcError>`.
pub struct ResultReturn<R>(PhantomData<R>);

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        impl<Fun, Res, $($ty,)*> Handler<($($ty,)*), ValueReturn<Res>> for Fun
        where
            Fun: Fn($($ty),*) -> Res + Send + Sync + 'static,
            Res: ToJson + 'static,
            $($ty: crate::codec::FromJson + 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(&self, params: &Value) -> Result<Value, RpcError> {
                let ($($ty,)*) = <($($ty,)*)>::from_params(params)?;
                Ok((self)($($ty),*).to_json())
            }
        }

        impl<Fun, Res, $($ty,)*> Handler<($($ty,)*), ResultReturn<Res>> for Fun
        where
            Fun: Fn($($ty),*) -> Result<Res, RpcError> + Send + Sync + 'static,
            Res: ToJson + 'static,
            $($ty: crate::codec::FromJson + 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(&self, params: &Value) -> Result<Value, RpcError> {
                let ($($ty,)*) = <($($ty,)*)>::from_params(params)?;
                let result = (self)($($ty),*)?;
                Ok(result.to_json())
            }
        }
    };
}

impl_handler!();
impl_handler!(P1);
impl_handler!(P1, P2);
impl_handler!(P1, P2, P3);
impl_handler!(P1, P2, P3, P4);
impl_handler!(P1, P2, P3, P4, P5);
impl_handler!(P1, P2, P3, P4, P5, P6);
impl_handler!(P1, P2, P3, P4, P5, P6, P7);
impl_handler!(P1, P2, P3, P4, P5, P6, P7, P8);

/// Uniform invocation surface once the typed signature is erased.
trait RegisteredMethod: Send + Sync {
    fn invoke(&self, params: &Value) -> Result<Value, RpcError>;
}

struct MethodEntry<H, Args, Ret> {
    handler: H,
    _marker: PhantomData<fn() -> (Args, Ret)>,
}

impl<H, Args, Ret> RegisteredMethod for MethodEntry<H, Args, Ret>
where
    H: Handler<Args, Ret>,
    Args: 'static,
    Ret: 'static,
{
    fn invoke(&self, params: &Value) -> Result<Value, RpcError> {
        self.handler.invoke(params)
    }
}

type MethodTable = Mutex<HashMap<String, Arc<dyn RegisteredMethod>>>;

/// Default batch parallelism: `max(2, hardware parallelism)`.
pub fn default_batch_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .max(2)
}

struct BatchPool {
    threads: usize,
    runtime: runtime::Runtime,
}

impl BatchPool {
    fn new(threads: usize) -> Self {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("rill-batch")
            .build()
            .expect("failed to build batch worker pool");
        Self { threads, runtime }
    }
}

/// Thread-safe table of registered procedures plus the worker pool used for
/// batch execution.
pub struct MethodRegistry {
    methods: Arc<MethodTable>,
    pool: Mutex<BatchPool>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::with_batch_concurrency(default_batch_concurrency())
    }

    /// Build a registry whose worker pool has `threads` workers (minimum 1).
    pub fn with_batch_concurrency(threads: usize) -> Self {
        Self {
            methods: Arc::new(Mutex::new(HashMap::new())),
            pool: Mutex::new(BatchPool::new(threads.max(1))),
        }
    }

    /// Register a procedure under `name`. Registering an existing name
    /// replaces the previous procedure.
    pub fn register<Args, Ret, H>(&self, name: impl Into<String>, handler: H)
    where
        H: Handler<Args, Ret>,
        Args: 'static,
        Ret: 'static,
    {
        let entry: Arc<dyn RegisteredMethod> = Arc::new(MethodEntry {
            handler,
            _marker: PhantomData,
        });
        let name = name.into();
        debug!(method = %name, "registering method");
        self.methods.lock().unwrap().insert(name, entry);
    }

    /// Names of all registered procedures.
    pub fn method_names(&self) -> Vec<String> {
        self.methods.lock().unwrap().keys().cloned().collect()
    }

    /// Invoke a single request inline and produce its response.
    pub fn invoke(&self, request: &Request) -> Response {
        dispatch(&self.methods, request)
    }

    /// Execute a batch on the worker pool.
    ///
    /// Every member is submitted as its own task, so members run
    /// concurrently up to the pool width. Results of notifications are
    /// dropped, failures included. Handles are awaited in submission order,
    /// which keeps the surviving responses aligned with their requests no
    /// matter how execution interleaves.
    pub async fn invoke_batch(&self, requests: Vec<Request>) -> Vec<Response> {
        let tasks: Vec<_> = {
            let pool = self.pool.lock().unwrap();
            requests
                .into_iter()
                .map(|request| {
                    let methods = Arc::clone(&self.methods);
                    let has_id = request.has_id();
                    let id = request.response_id();
                    let handle = pool
                        .runtime
                        .spawn(async move { dispatch(&methods, &request) });
                    (has_id, id, handle)
                })
                .collect()
        };

        let mut responses = Vec::new();
        for (has_id, id, handle) in tasks {
            match handle.await {
                Ok(response) => {
                    if has_id {
                        responses.push(response);
                    }
                }
                // dispatch contains panics, so a join failure means the
                // pool was torn down under us
                Err(err) => {
                    warn!("batch task failed to complete: {err}");
                    if has_id {
                        responses.push(Response::failure(
                            RpcError::internal(format!("batch task failed: {err}")),
                            id,
                        ));
                    }
                }
            }
        }
        responses
    }

    pub fn batch_concurrency(&self) -> usize {
        self.pool.lock().unwrap().threads
    }

    /// Rebuild the worker pool with `threads` workers (minimum 1).
    ///
    /// Dropping the previous pool drains queued work and joins its threads
    /// before the replacement spawns, so this must run on a plain thread,
    /// not inside an async task. Callers must not resize while batches are
    /// in flight; the server enforces this by rejecting resizes while
    /// running.
    pub fn set_batch_concurrency(&self, threads: usize) {
        let threads = threads.max(1);
        let mut pool = self.pool.lock().unwrap();
        *pool = BatchPool::new(threads);
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(methods: &MethodTable, request: &Request) -> Response {
    let id = request.response_id();

    // Clone the entry out so the procedure runs outside the table lock.
    let method = methods.lock().unwrap().get(request.method()).cloned();
    let Some(method) = method else {
        return Response::failure(RpcError::method_not_found(request.method()), id);
    };

    match panic::catch_unwind(AssertUnwindSafe(|| method.invoke(request.params()))) {
        Ok(Ok(result)) => Response::success(result, id),
        Ok(Err(error)) => Response::failure(error, id),
        Err(payload) => Response::failure(
            RpcError::internal(format!(
                "method execution failed: {}",
                panic_message(payload.as_ref())
            )),
            id,
        ),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
