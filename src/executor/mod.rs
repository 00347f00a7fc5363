//! Bridge between blocking work and async callers
//!
//! [`Executor`] runs a blocking closure on tokio's blocking thread set behind a
//! fixed-size admission semaphore. [`run_as_sync`] goes the other way: it drives
//! a future to completion from synchronous code, after checking which scheduler
//! (if any) already owns the current thread.

use crate::config::ExecutorConfig;
use crate::{NewzError, Result};
use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Semaphore;

thread_local! {
    /// Set while a bridge closure runs on a blocking thread
    static ON_BRIDGE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running bridge work until dropped
struct BridgeMark {
    previous: bool,
}

impl BridgeMark {
    fn enter() -> Self {
        Self {
            previous: ON_BRIDGE.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for BridgeMark {
    fn drop(&mut self) {
        ON_BRIDGE.with(|flag| flag.set(self.previous));
    }
}

/// Process-scoped handle for running blocking work off the async threads
///
/// Cloning is cheap; every clone shares the same admission semaphore.
#[derive(Debug, Clone)]
pub struct Executor {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Executor {
    /// Creates an executor admitting at most `size` blocking operations at once
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.bridge_threads)
    }

    /// Number of blocking operations allowed to run concurrently
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `op` on a blocking thread and awaits its result
    ///
    /// A panic inside `op` is returned as [`NewzError::Task`].
    pub async fn run_as_async<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| NewzError::Concurrency("executor has been closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _mark = BridgeMark::enter();
            op()
        })
        .await
            .map_err(|e| match e.try_into_panic() {
                Ok(payload) => NewzError::Task(panic_message(payload.as_ref())),
                Err(e) => NewzError::Task(e.to_string()),
            })
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

/// Which scheduler, if any, is driving the current thread
#[derive(Debug, Clone)]
pub enum SchedulerContext {
    /// Plain thread, no runtime entered
    Absent,

    /// Inside a multi-thread runtime; work can be handed to it
    MultiThread(Handle),

    /// On a blocking thread of a current-thread runtime; the runtime's
    /// scheduler lives elsewhere, so its handle can drive the future
    CurrentThreadBlocking(Handle),

    /// On the scheduler thread of a current-thread runtime; a nested
    /// scheduler would deadlock
    CurrentThread,
}

impl SchedulerContext {
    pub fn detect() -> Self {
        match Handle::try_current() {
            Err(_) => SchedulerContext::Absent,
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread if ON_BRIDGE.with(Cell::get) => {
                    SchedulerContext::CurrentThreadBlocking(handle)
                }
                RuntimeFlavor::CurrentThread => SchedulerContext::CurrentThread,
                _ => SchedulerContext::MultiThread(handle),
            },
        }
    }
}

/// Drives `future` to completion from synchronous code
///
/// - no runtime on this thread: a current-thread runtime is built for the call
/// - multi-thread runtime: the future runs on it through `block_in_place`
/// - blocking thread of a current-thread runtime (inside
///   [`Executor::run_as_async`]): the future runs on that runtime's handle
/// - scheduler thread of a current-thread runtime: refused with
///   [`NewzError::Concurrency`]
pub fn run_as_sync<F>(future: F) -> Result<F::Output>
where
    F: Future,
{
    match SchedulerContext::detect() {
        SchedulerContext::Absent => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok(runtime.block_on(future))
        }
        SchedulerContext::MultiThread(handle) => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        SchedulerContext::CurrentThreadBlocking(handle) => Ok(handle.block_on(future)),
        SchedulerContext::CurrentThread => Err(NewzError::Concurrency(
            "cannot block on a future from inside a current-thread runtime".to_string(),
        )),
    }
}

/// Renders a panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
