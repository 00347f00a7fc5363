//! Bounded worker pool
//!
//! Items wait in a bounded queue; up to `size` workers drain it. A worker that
//! finds the queue empty for the idle timeout exits, and the next `submit`
//! starts a new one. Completion is tracked with a pending counter and a
//! [`Notify`], so waiting never polls.

use crate::config::{LanePolicy, PoolConfig};
use crate::executor::{panic_message, run_as_sync};
use crate::{NewzError, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};

/// Future produced by a work item
pub type WorkFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A unit of work; called once by the worker that picks it up
pub type WorkItem = Box<dyn FnOnce() -> WorkFuture + Send>;

/// Lifecycle of a pool batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Nothing queued or running
    Idle,
    /// Items are queued or running
    Running,
    /// A caller is waiting for the batch to finish
    Draining,
}

/// Outcome counts of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub completed: usize,
    pub failed: usize,
}

impl PoolReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }
}

/// Queued item tagged with the abandon generation it was submitted in
type Queued = (u64, WorkItem);

struct Shared {
    receiver: Mutex<mpsc::Receiver<Queued>>,
    idle_timeout: Duration,

    /// Submitted but not yet finished
    pending: AtomicUsize,
    live_workers: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,

    /// Bumped by `abandon`; older items are dropped instead of run
    generation: AtomicU64,

    done: Notify,
}

impl Shared {
    async fn run_item(&self, generation: u64, item: WorkItem) {
        if generation != self.generation.load(Ordering::SeqCst) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Dropping abandoned work item");
        } else {
            match AssertUnwindSafe(async move { item().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Err(e)) => {
                    self.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::error!(error = %e, "Work item failed");
                }
                Err(payload) => {
                    self.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::error!(panic = %panic_message(payload.as_ref()), "Work item panicked");
                }
            }
        }
        self.release_pending();
    }

    fn release_pending(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.done.notify_waiters();
        }
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let next = tokio::time::timeout(shared.idle_timeout, async {
            shared.receiver.lock().await.recv().await
        })
        .await;

        match next {
            Ok(Some((generation, item))) => shared.run_item(generation, item).await,
            Ok(None) => {
                // pool dropped
                shared.live_workers.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            Err(_) => {
                // Leave first, then look once more: a submit that saw this
                // worker as live must not strand its item.
                shared.live_workers.fetch_sub(1, Ordering::SeqCst);
                let late = shared.receiver.lock().await.try_recv().ok();
                match late {
                    Some((generation, item)) => {
                        shared.live_workers.fetch_add(1, Ordering::SeqCst);
                        shared.run_item(generation, item).await;
                    }
                    None => {
                        tracing::trace!("Idle worker exiting");
                        return;
                    }
                }
            }
        }
    }
}

/// A pool of at most `size` workers draining a queue of `capacity` items
pub struct WorkerPool {
    sender: mpsc::Sender<Queued>,
    shared: Arc<Shared>,
    size: usize,
    capacity: usize,
    policy: LanePolicy,
    runtime: Option<Handle>,
    waiting: AtomicBool,
    spawned: AtomicUsize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool
    ///
    /// With [`LanePolicy::Shared`] workers are tasks on the tokio runtime that
    /// is current when the pool is created (or when an item is submitted).
    /// With [`LanePolicy::Isolated`] each worker is an OS thread driving its
    /// own current-thread runtime.
    pub fn new(size: usize, capacity: usize, idle_timeout: Duration, policy: LanePolicy) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender,
            shared: Arc::new(Shared {
                receiver: Mutex::new(receiver),
                idle_timeout,
                pending: AtomicUsize::new(0),
                live_workers: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
                done: Notify::new(),
            }),
            size: size.max(1),
            capacity,
            policy,
            runtime: Handle::try_current().ok(),
            waiting: AtomicBool::new(false),
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn from_config(size: usize, capacity: usize, config: &PoolConfig) -> Self {
        Self::new(size, capacity, config.idle_timeout(), config.lane_policy)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> LanePolicy {
        self.policy
    }

    pub fn state(&self) -> PoolState {
        if self.waiting.load(Ordering::SeqCst) {
            PoolState::Draining
        } else if self.shared.pending.load(Ordering::SeqCst) > 0 {
            PoolState::Running
        } else {
            PoolState::Idle
        }
    }

    /// Workers currently alive
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::SeqCst)
    }

    /// Items submitted and not finished yet
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Queues an async operation
    ///
    /// Fails with [`NewzError::PoolExhausted`] when the queue is full.
    pub fn submit<F, Fut>(&self, op: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.submit_item(Box::new(move || Box::pin(op()) as WorkFuture))
    }

    pub fn submit_item(&self, item: WorkItem) -> Result<()> {
        let runtime = match self.policy {
            LanePolicy::Shared => Some(
                Handle::try_current()
                    .ok()
                    .or_else(|| self.runtime.clone())
                    .ok_or_else(|| {
                        NewzError::Concurrency(
                            "shared lanes need a tokio runtime to run on".to_string(),
                        )
                    })?,
            ),
            LanePolicy::Isolated => None,
        };

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let generation = self.shared.generation.load(Ordering::SeqCst);
        if let Err(e) = self.sender.try_send((generation, item)) {
            self.shared.release_pending();
            return Err(match e {
                TrySendError::Full(_) => NewzError::PoolExhausted {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => {
                    NewzError::Concurrency("worker pool queue is closed".to_string())
                }
            });
        }

        self.ensure_worker(runtime)
    }

    fn ensure_worker(&self, runtime: Option<Handle>) -> Result<()> {
        let live = self.shared.live_workers.load(Ordering::SeqCst);
        if live >= self.size
            || self
                .shared
                .live_workers
                .compare_exchange(live, live + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return Ok(());
        }

        let shared = self.shared.clone();
        let id = self.spawned.fetch_add(1, Ordering::SeqCst);
        match runtime {
            Some(handle) => {
                handle.spawn(run_worker(shared));
            }
            None => {
                let spawned = std::thread::Builder::new()
                    .name(format!("newz-lane-{}", id))
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(runtime) => runtime.block_on(run_worker(shared)),
                            Err(e) => {
                                shared.live_workers.fetch_sub(1, Ordering::SeqCst);
                                tracing::error!(error = %e, "Could not start lane runtime");
                            }
                        }
                    });
                if let Err(e) = spawned {
                    self.shared.live_workers.fetch_sub(1, Ordering::SeqCst);
                    return Err(e.into());
                }
            }
        }

        tracing::trace!(worker = id, policy = ?self.policy, "Started worker");
        Ok(())
    }

    /// Waits until every submitted item has finished, then resets the counters
    ///
    /// Only one caller may wait at a time; a second concurrent call fails with
    /// [`NewzError::Concurrency`].
    pub async fn wait_completion(&self) -> Result<PoolReport> {
        if self
            .waiting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NewzError::Concurrency(
                "wait_completion is already running on this pool".to_string(),
            ));
        }
        let _waiting = WaitingFlag(&self.waiting);

        loop {
            let notified = self.shared.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.pending.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }

        let report = PoolReport {
            completed: self.shared.completed.swap(0, Ordering::SeqCst),
            failed: self.shared.failed.swap(0, Ordering::SeqCst),
        };
        tracing::debug!(
            completed = report.completed,
            failed = report.failed,
            "Pool batch finished"
        );
        Ok(report)
    }

    /// Blocking form of [`wait_completion`](Self::wait_completion)
    pub fn wait_completion_blocking(&self) -> Result<PoolReport> {
        run_as_sync(self.wait_completion())?
    }

    /// Drops every queued item; items already running finish normally
    ///
    /// Dropped items are counted as failed.
    pub fn abandon(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            generation,
            pending = self.pending(),
            "Abandoning queued work"
        );
    }
}

struct WaitingFlag<'a>(&'a AtomicBool);

impl Drop for WaitingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
