use crate::error::PoolError;
use crate::manager::PoolShared;
use crate::signal::CompletionSignal;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

lazy_static::lazy_static! {
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// The closure a task runs. User work is wrapped as `|| Ok(f())`; continuation
/// work returns the antecedent's failure as its own.
pub(crate) type TaskWork<R> = Box<dyn FnOnce() -> Result<R, PoolError> + Send + 'static>;

/// A type-erased runnable placed on the pool queue (a task's `execute`).
pub(crate) type TaskEntryPoint = Box<dyn FnOnce() + Send + 'static>;

/// Internal state of one task: its work, its eventual outcome, the one-shot
/// completion signal, and the continuations waiting on it.
///
/// A task moves through Pending -> Running -> {Succeeded, Failed} strictly
/// once. `started` is the Pending->Running compare-and-swap; the outcome slot
/// is written before the signal opens, so any thread that sees the signal open
/// may read it.
pub(crate) struct TaskCore<R: Send + 'static> {
  task_id: u64,
  work: Mutex<Option<TaskWork<R>>>,
  outcome: Mutex<Option<Result<R, PoolError>>>,
  signal: CompletionSignal,
  started: AtomicBool,
  enqueued: AtomicBool,
  continuations: Mutex<Vec<TaskEntryPoint>>,
  pool: Arc<PoolShared>,
}

impl<R: Send + 'static> TaskCore<R> {
  pub(crate) fn new(pool: Arc<PoolShared>, work: TaskWork<R>) -> Arc<Self> {
    Arc::new(Self {
      task_id: NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
      work: Mutex::new(Some(work)),
      outcome: Mutex::new(None),
      signal: CompletionSignal::new(),
      started: AtomicBool::new(false),
      enqueued: AtomicBool::new(false),
      continuations: Mutex::new(Vec::new()),
      pool,
    })
  }

  pub(crate) fn id(&self) -> u64 {
    self.task_id
  }

  pub(crate) fn pool(&self) -> &Arc<PoolShared> {
    &self.pool
  }

  pub(crate) fn is_completed(&self) -> bool {
    self.signal.is_open()
  }

  /// Marks the task as admitted to the pool queue. Read by the
  /// pool-terminated fast-path of `wait_result`.
  pub(crate) fn mark_enqueued(&self) {
    self.enqueued.store(true, AtomicOrdering::Release);
  }

  /// Rolls the admission mark back after a failed send, so `wait_result`
  /// fails fast instead of waiting on work that never reached the queue.
  pub(crate) fn unmark_enqueued(&self) {
    self.enqueued.store(false, AtomicOrdering::Release);
  }

  /// Runs the work exactly once and publishes the outcome.
  ///
  /// A duplicate invocation (accidental double enqueue) is a no-op thanks to
  /// the `started` guard. Panics from the work are captured into the error
  /// slot and never propagate out of the worker thread.
  pub(crate) fn execute(&self) {
    if self.started.swap(true, AtomicOrdering::AcqRel) {
      warn!(task_id = self.task_id, "Execute: duplicate invocation ignored.");
      return;
    }

    let work = match self.work.lock().take() {
      Some(work) => work,
      None => {
        // Unreachable once `started` has been won, kept as a guard.
        warn!(task_id = self.task_id, "Execute: work slot already empty.");
        return;
      }
    };

    trace!(task_id = self.task_id, "Executing task work.");
    let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
      Ok(result) => result,
      Err(payload) => {
        let message = panic_message(payload);
        debug!(task_id = self.task_id, %message, "Task work panicked; capturing failure.");
        Err(PoolError::TaskFailed(message))
      }
    };

    self.complete(outcome);
  }

  /// Stores the outcome, opens the signal, then schedules every registered
  /// continuation. The signal opens before the registry drains so that a
  /// concurrent `register_continuation` either lands in the drained batch or
  /// observes the open signal and schedules itself.
  fn complete(&self, outcome: Result<R, PoolError>) {
    *self.outcome.lock() = Some(outcome);
    self.signal.open();

    let pending = std::mem::take(&mut *self.continuations.lock());
    if !pending.is_empty() {
      debug!(
        task_id = self.task_id,
        count = pending.len(),
        "Task complete; scheduling pending continuations."
      );
    }
    for schedule in pending {
      schedule();
    }
  }

  /// Completes a task that could not be admitted to the pool with the
  /// scheduling error, waking any observer already blocked on the result.
  /// A no-op if the task already started by other means.
  pub(crate) fn fail_unscheduled(&self, error: PoolError) {
    if self.started.swap(true, AtomicOrdering::AcqRel) {
      return;
    }
    self.work.lock().take();
    self.complete(Err(error));
  }

  /// Registers a scheduling thunk to run when this task completes.
  ///
  /// If the task is already complete the thunk runs immediately; otherwise it
  /// is parked in the registry and run from the completion path. The check and
  /// the push happen under the registry lock, so the thunk runs exactly once
  /// regardless of how the registration races with completion.
  pub(crate) fn register_continuation(&self, schedule: TaskEntryPoint) {
    let mut pending = self.continuations.lock();
    if !self.signal.is_open() {
      pending.push(schedule);
      return;
    }
    drop(pending);
    trace!(task_id = self.task_id, "Antecedent already complete; scheduling continuation now.");
    schedule();
  }

  /// Blocks until the outcome is available and returns a clone of it.
  ///
  /// Fast-fails with [`PoolError::PoolTerminated`] when the pool has shut
  /// down and this task was never admitted to the queue and never started:
  /// such a task will never run, and blocking would hang forever. A task that
  /// was queued before shutdown still gets to run and is unaffected.
  pub(crate) fn wait_result(&self) -> Result<R, PoolError>
  where
    R: Clone,
  {
    if !self.signal.is_open() && self.pool.is_terminated() {
      // Read under the pool's admission lock so the check cannot interleave
      // with a schedule() call that is about to admit this task. Once the
      // lock is held, either the task is already marked enqueued, or any
      // later schedule() re-reads the terminating flag and rejects it.
      let never_runs = self.pool.with_admission_lock(|| {
        self.pool.is_terminated()
          && !self.enqueued.load(AtomicOrdering::Acquire)
          && !self.started.load(AtomicOrdering::Acquire)
      });
      if never_runs {
        warn!(
          task_id = self.task_id,
          "Result requested for a task the terminated pool will never run."
        );
        return Err(PoolError::PoolTerminated);
      }
    }

    self.signal.wait();
    self
      .outcome
      .lock()
      .clone()
      .expect("completion signal opened without a stored outcome")
  }
}

/// Renders a panic payload as the failure message, preserving `&str` and
/// `String` payloads verbatim.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "task panicked with a non-string payload".to_string()
  }
}
