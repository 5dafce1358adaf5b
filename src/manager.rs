use crate::error::PoolError;
use crate::handle::TaskHandle;
use crate::task::{TaskCore, TaskEntryPoint, TaskWork};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

/// State shared between the manager, its worker threads, and every task bound
/// to the pool (the task's back-reference for termination checks and
/// continuation scheduling).
pub(crate) struct PoolShared {
  pool_name: Arc<String>,
  /// Queue sender; `None` once shutdown has closed admissions. Dropping the
  /// sender is what lets workers drain the queue and exit.
  queue_tx: Mutex<Option<Sender<TaskEntryPoint>>>,
  /// Set once, never reset. Gates every submission.
  terminating: AtomicBool,
  active_count: AtomicUsize,
}

impl PoolShared {
  pub(crate) fn is_terminated(&self) -> bool {
    self.terminating.load(AtomicOrdering::Acquire)
  }

  /// Admits a task's execute entry-point to the queue.
  ///
  /// The whole admission decision happens under the queue lock: the
  /// terminating check, the enqueued mark, and the send. The result()
  /// fast path reads the task's state under the same lock, so a task is
  /// either admitted (and the fast path sees `enqueued`) or rejected on
  /// both sides; there is no window where the two disagree.
  /// Re-scheduling an already-admitted core only re-enqueues its
  /// entry-point, which the task's started guard turns into a no-op.
  pub(crate) fn schedule<R: Send + 'static>(&self, core: Arc<TaskCore<R>>) -> Result<(), PoolError> {
    let guard = self.queue_tx.lock();
    if self.is_terminated() {
      debug!(
        pool_name = %*self.pool_name,
        task_id = core.id(),
        "Schedule: pool is terminating, rejecting task."
      );
      return Err(PoolError::PoolTerminated);
    }

    match guard.as_ref() {
      Some(tx) => {
        core.mark_enqueued();
        let runnable = Arc::clone(&core);
        let entry: TaskEntryPoint = Box::new(move || runnable.execute());
        match tx.send(entry) {
          Ok(()) => {
            trace!(pool_name = %*self.pool_name, task_id = core.id(), "Task entry-point enqueued.");
            Ok(())
          }
          Err(_) => {
            core.unmark_enqueued();
            error!(
              pool_name = %*self.pool_name,
              task_id = core.id(),
              "Schedule: task queue disconnected while sending."
            );
            if self.is_terminated() {
              Err(PoolError::PoolTerminated)
            } else {
              Err(PoolError::QueueDisconnected)
            }
          }
        }
      }
      None => Err(PoolError::PoolTerminated),
    }
  }

  /// Runs `f` while holding the queue lock, excluding any in-flight
  /// `schedule()` decision. The result() fast path uses this so it never
  /// observes a task mid-admission.
  pub(crate) fn with_admission_lock<T>(&self, f: impl FnOnce() -> T) -> T {
    let _guard = self.queue_tx.lock();
    f()
  }
}

/// A fixed-size pool of worker threads draining a shared queue of task
/// entry-points.
///
/// Tasks are submitted as plain closures and observed through
/// [`TaskHandle`]s. Shutdown is cooperative: it closes the queue to further
/// admissions, lets everything already admitted run to completion, and joins
/// every worker before returning.
pub struct ThreadPoolManager {
  shared: Arc<PoolShared>,
  worker_count: usize,
  worker_join_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolManager {
  /// Creates a pool with `worker_count` dedicated threads (clamped to at
  /// least 1), each named `{pool_name}-worker-{index}`.
  pub fn new(worker_count: usize, pool_name: &str) -> Self {
    let worker_count = worker_count.max(1);
    let (tx, rx) = crossbeam_channel::unbounded::<TaskEntryPoint>();

    let shared = Arc::new(PoolShared {
      pool_name: Arc::new(pool_name.to_string()),
      queue_tx: Mutex::new(Some(tx)),
      terminating: AtomicBool::new(false),
      active_count: AtomicUsize::new(0),
    });

    let mut worker_join_handles = Vec::with_capacity(worker_count);
    for worker_index in 0..worker_count {
      let worker_shared = Arc::clone(&shared);
      let worker_rx = rx.clone();
      let handle = thread::Builder::new()
        .name(format!("{}-worker-{}", pool_name, worker_index))
        .spawn(move || Self::run_worker_loop(worker_shared, worker_rx, worker_index))
        .expect("failed to spawn pool worker thread");
      worker_join_handles.push(handle);
    }

    info!(pool_name, worker_count, "Worker pool started.");
    Self {
      shared,
      worker_count,
      worker_join_handles: Mutex::new(worker_join_handles),
    }
  }

  pub fn name(&self) -> &str {
    &self.shared.pool_name
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  /// Number of entry-points currently waiting in the queue.
  pub fn queued_task_count(&self) -> usize {
    self.shared.queue_tx.lock().as_ref().map_or(0, |tx| tx.len())
  }

  /// Number of entry-points currently running on workers.
  pub fn active_task_count(&self) -> usize {
    self.shared.active_count.load(AtomicOrdering::Acquire)
  }

  /// Submits a closure as a new task and returns its handle.
  ///
  /// # Errors
  /// Returns [`PoolError::PoolTerminated`] once [`shutdown`](Self::shutdown)
  /// has been called.
  pub fn submit<R, F>(&self, work: F) -> Result<TaskHandle<R>, PoolError>
  where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
  {
    if self.shared.is_terminated() {
      warn!(
        pool_name = %*self.shared.pool_name,
        "Submit: attempted to submit task to a pool that is shutting down."
      );
      return Err(PoolError::PoolTerminated);
    }

    let work: TaskWork<R> = Box::new(move || Ok(work()));
    let core = TaskCore::new(Arc::clone(&self.shared), work);
    debug!(
      pool_name = %*self.shared.pool_name,
      task_id = core.id(),
      "Submitting task to queue."
    );
    self.shared.schedule(Arc::clone(&core))?;
    Ok(TaskHandle { core })
  }

  /// Shuts the pool down and blocks until every worker has exited.
  ///
  /// Sets the terminating flag and closes the queue, so every subsequent
  /// `submit` fails with [`PoolError::PoolTerminated`]. Work already admitted
  /// (queued or in flight) still runs to completion and its results stay
  /// retrievable. A second call is a no-op that returns immediately.
  pub fn shutdown(&self) {
    let first_call = !self.shared.terminating.swap(true, AtomicOrdering::SeqCst);
    if first_call {
      info!(
        pool_name = %*self.shared.pool_name,
        "Initiating pool shutdown; closing queue to further admissions."
      );
      *self.shared.queue_tx.lock() = None;
    } else {
      debug!(pool_name = %*self.shared.pool_name, "Shutdown already initiated by a previous call.");
    }

    let worker_join_handles = std::mem::take(&mut *self.worker_join_handles.lock());
    if worker_join_handles.is_empty() {
      trace!(
        pool_name = %*self.shared.pool_name,
        "Worker join handles already taken; nothing to wait for."
      );
      return;
    }

    info!(
      pool_name = %*self.shared.pool_name,
      count = worker_join_handles.len(),
      "Waiting for workers to drain the queue and exit."
    );
    for handle in worker_join_handles {
      if handle.join().is_err() {
        error!(
          pool_name = %*self.shared.pool_name,
          "A worker thread panicked before exiting."
        );
      }
    }
    info!(pool_name = %*self.shared.pool_name, "Pool shutdown complete; all workers joined.");
  }

  fn run_worker_loop(shared: Arc<PoolShared>, queue_rx: Receiver<TaskEntryPoint>, worker_index: usize) {
    debug!(pool_name = %*shared.pool_name, worker_index, "Worker started.");

    // recv() fails only once the sender is dropped AND the queue is empty,
    // so shutdown drains everything admitted before it closed the queue.
    while let Ok(entry) = queue_rx.recv() {
      shared.active_count.fetch_add(1, AtomicOrdering::AcqRel);
      entry();
      shared.active_count.fetch_sub(1, AtomicOrdering::AcqRel);
    }

    debug!(
      pool_name = %*shared.pool_name,
      worker_index,
      "Task queue closed and drained. Worker exiting."
    );
  }
}

impl Drop for ThreadPoolManager {
  fn drop(&mut self) {
    // Mirror of shutdown() without the blocking joins: signal termination and
    // close the queue; workers drain whatever was admitted and exit detached.
    if !self.shared.terminating.swap(true, AtomicOrdering::SeqCst) {
      info!(
        pool_name = %*self.shared.pool_name,
        "ThreadPoolManager dropped without explicit shutdown. Closing queue; workers will drain and exit."
      );
      *self.shared.queue_tx.lock() = None;
    } else {
      trace!(
        pool_name = %*self.shared.pool_name,
        "Drop: shutdown already in progress or completed. No new signals sent."
      );
    }
  }
}
