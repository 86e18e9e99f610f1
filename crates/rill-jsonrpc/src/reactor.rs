//! Single-threaded cooperative driver.
//!
//! Each server and each client owns one `Reactor`: a private current-thread
//! runtime plus bookkeeping for the work spawned onto it. Nothing makes
//! progress unless an entry point (`run`, `poll`, `run_for`,
//! `run_until_idle`, or `block_on`) is pumping the loop on the embedder's
//! thread.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime;
use tokio::sync::Notify;

/// How many cooperative passes one `poll` gives the ready queue. Tasks that
/// are runnable without new I/O finish well within this budget; tasks parked
/// on the network stay parked.
const POLL_PASSES: usize = 64;

pub struct Reactor {
    runtime: runtime::Runtime,
    pending: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            pending: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Spawn a tracked unit of work. It runs only while the loop is pumped.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let completed = Arc::clone(&self.completed);
        let idle = Arc::clone(&self.idle);
        self.runtime.spawn(async move {
            future.await;
            completed.fetch_add(1, Ordering::SeqCst);
            if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_one();
            }
        });
    }

    /// Drive the loop for the duration of one foreground future. Spawned
    /// work runs concurrently with it.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let _guard = RunningGuard::enter(&self.running);
        self.runtime.block_on(future)
    }

    /// Block until every tracked task has completed. Returns the number of
    /// completions processed.
    pub fn run(&self) -> usize {
        let before = self.completed.load(Ordering::SeqCst);
        self.block_on(async {
            while self.pending.load(Ordering::SeqCst) > 0 {
                self.idle.notified().await;
            }
        });
        self.completed.load(Ordering::SeqCst) - before
    }

    /// Process the completions that are ready right now without waiting for
    /// new I/O. Returns the number processed; never blocks.
    pub fn poll(&self) -> usize {
        let before = self.completed.load(Ordering::SeqCst);
        self.block_on(async {
            for _ in 0..POLL_PASSES {
                tokio::task::yield_now().await;
            }
        });
        self.completed.load(Ordering::SeqCst) - before
    }

    /// Drive the loop for at most `duration`. Returns the number of
    /// completions processed in the window.
    pub fn run_for(&self, duration: Duration) -> usize {
        let before = self.completed.load(Ordering::SeqCst);
        let _ = self.block_on(async {
            tokio::time::timeout(duration, async {
                while self.pending.load(Ordering::SeqCst) > 0 {
                    self.idle.notified().await;
                }
            })
            .await
        });
        self.completed.load(Ordering::SeqCst) - before
    }

    /// Poll repeatedly until a poll processes nothing. Does not wait for
    /// new I/O. Returns the cumulative count.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let processed = self.poll();
            if processed == 0 {
                break;
            }
            total += processed;
        }
        total
    }

    /// Snapshot of the running flag: true while an entry point is pumping
    /// the loop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tracked tasks not yet complete.
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Clears the running flag on every exit path, panic included.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn run_until_idle_processes_posted_handlers() {
        let reactor = Reactor::new().unwrap();
        let executed = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let executed = Arc::clone(&executed);
            reactor.spawn(async move {
                executed.fetch_add(1, Ordering::SeqCst);
            });
        }
        let processed = reactor.run_until_idle();
        assert!(processed >= 5);
        assert_eq!(executed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn run_until_idle_returns_immediately_when_empty() {
        let reactor = Reactor::new().unwrap();
        assert_eq!(reactor.run_until_idle(), 0);
    }

    #[test]
    fn run_waits_for_all_tracked_work() {
        let reactor = Reactor::new().unwrap();
        let executed = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let executed = Arc::clone(&executed);
            reactor.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                executed.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(reactor.run(), 3);
        assert_eq!(executed.load(Ordering::SeqCst), 3);
        assert_eq!(reactor.pending_tasks(), 0);
    }

    #[test]
    fn run_for_bounds_the_wait() {
        let reactor = Reactor::new().unwrap();
        reactor.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let started = std::time::Instant::now();
        let processed = reactor.run_for(Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(processed, 0);
        assert_eq!(reactor.pending_tasks(), 1);
    }

    #[test]
    fn run_for_processes_fast_work() {
        let reactor = Reactor::new().unwrap();
        reactor.spawn(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
        });
        let processed = reactor.run_for(Duration::from_millis(500));
        assert_eq!(processed, 1);
    }

    #[test]
    fn poll_never_blocks_on_io_bound_work() {
        let reactor = Reactor::new().unwrap();
        reactor.spawn(async {
            // parked until a peer connects, which never happens
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let _ = listener.accept().await;
        });
        let started = std::time::Instant::now();
        assert_eq!(reactor.poll(), 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn running_flag_clears_after_exit() {
        let reactor = Reactor::new().unwrap();
        assert!(!reactor.is_running());
        reactor.run();
        assert!(!reactor.is_running());
    }
}
