//! Single-worker serialization of state mutation.
//!
//! A [`SerializedExecutor`] owns a state value and a dedicated OS thread.
//! Operations submitted with [`enqueue`](SerializedExecutor::enqueue) or
//! [`call`](SerializedExecutor::call) run on that thread strictly one at a
//! time, in submission order, and never re-entrantly. Submitting never blocks
//! the caller.
//!
//! Dropping the executor stops the worker after the operation currently
//! running, if any. Queued operations are discarded without running; a
//! pending `call` then resolves to [`Error::ExecutorClosed`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::{Error, Result};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Runs operations against an owned state value on one dedicated worker.
pub struct SerializedExecutor<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
    open: Arc<AtomicBool>,
    name: String,
}

impl<S> SerializedExecutor<S>
where
    S: Send + 'static,
{
    /// Spawn the worker thread owning `state`.
    ///
    /// `name` labels the thread and log lines.
    pub fn spawn(name: impl Into<String>, state: S) -> Result<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<S>>();
        let open = Arc::new(AtomicBool::new(true));

        let worker_open = Arc::clone(&open);
        let worker_name = name.clone();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut state = state;
                while let Some(job) = rx.blocking_recv() {
                    if !worker_open.load(Ordering::Acquire) {
                        break;
                    }
                    job(&mut state);
                }
                // Remaining jobs are dropped with `rx`.
                debug!("{} worker stopped", worker_name);
            })
            .map_err(Error::Io)?;

        debug!("{} worker started", name);
        Ok(Self { tx, open, name })
    }

    /// Submit an operation without waiting for it.
    ///
    /// Silently ignored once the executor is shutting down.
    pub fn enqueue<F>(&self, operation: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if !self.is_open() {
            trace!("{}: dropping operation submitted after shutdown", self.name);
            return;
        }
        if self.tx.send(Box::new(operation)).is_err() {
            trace!("{}: worker gone, operation dropped", self.name);
        }
    }

    /// Submit an operation and wait for its return value.
    ///
    /// The operation still runs on the worker; only the caller's task awaits.
    pub async fn call<F, R>(&self, operation: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(move |state| {
            // The caller may have stopped waiting; that is not an error here.
            let _ = reply_tx.send(operation(state));
        });
        reply_rx.await.map_err(|_| Error::ExecutorClosed)
    }

    /// Whether operations are still accepted.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl<S> Drop for SerializedExecutor<S> {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
        // Dropping `tx` wakes the worker if it is idle.
    }
}
