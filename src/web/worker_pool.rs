//! Fixed-size pool of encode threads.
//!
//! Tasks go through one shared crossbeam queue; each worker thread pulls the
//! next task, runs it and sends the result back on a oneshot channel. More
//! tasks than workers simply wait in the queue.
//!
//! Shutdown closes the queue to new work, lets the workers finish everything
//! already queued or running, then joins them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio::sync::oneshot;

use super::error::{panic_message, PoolError};
use crate::{sys_debug, sys_info, sys_warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub type SharedWorkerPool = Arc<WorkerPool>;

pub struct WorkerPool {
    /// `None` once shutdown has started.
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
    /// Tasks queued or running.
    pending: Arc<AtomicUsize>,
}

/// Await the result of one submitted task.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<std::thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    pub async fn join(self) -> Result<T, PoolError> {
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(PoolError::WorkerLost(format!(
                "task panicked: {}",
                panic_message(payload)
            ))),
            Err(_) => Err(PoolError::WorkerLost(
                "result channel closed before completion".to_string(),
            )),
        }
    }
}

impl WorkerPool {
    /// Start `size` worker threads (at least one).
    pub fn new(size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let handle = std::thread::Builder::new()
                .name(format!("embed-worker-{index}"))
                .spawn(move || worker_loop(index, receiver, pending))?;
            workers.push(handle);
        }

        sys_info!("[POOL] Started {} encode workers", size);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
            pending,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of tasks queued or currently running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.sender
            .lock()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }

    /// Queue `task`. Fails with `ShuttingDown` once shutdown has begun.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let sender = guard.as_ref().ok_or(PoolError::ShuttingDown)?;

        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task));
            // Caller may have gone away; nothing to do then.
            let _ = tx.send(result);
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::ShuttingDown);
        }

        Ok(TaskHandle { rx })
    }

    /// Reject new work, finish queued and running tasks, join the workers.
    /// Blocks the calling thread; see [`WorkerPool::drain`] for async callers.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        sys_info!("[POOL] Draining {} pending tasks", self.pending());

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        for handle in workers {
            if handle.join().is_err() {
                sys_warn!("[POOL] A worker thread exited abnormally");
            }
        }

        sys_info!("[POOL] All workers stopped");
    }

    /// Async wrapper around [`WorkerPool::shutdown`].
    pub async fn drain(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || pool.shutdown()).await {
            sys_warn!("[POOL] Drain task failed: {}", e);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers exit on their own once the queue disconnects and empties.
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Long-lived worker: pulls jobs until the queue is closed and empty.
fn worker_loop(index: usize, receiver: Receiver<Job>, pending: Arc<AtomicUsize>) {
    while let Ok(job) = receiver.recv() {
        job();
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    sys_debug!("[POOL] Worker {} exiting", index);
}
