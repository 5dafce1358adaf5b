use crate::error::PoolError;
use crate::task::{TaskCore, TaskEntryPoint, TaskWork};

use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// A handle to a task submitted to the [`ThreadPoolManager`](crate::ThreadPoolManager).
///
/// The handle is the task's blocking future: it exposes completion checks,
/// blocking result retrieval, and continuation chaining. Cloning a handle
/// shares the same underlying task, so any number of threads can observe the
/// same outcome.
pub struct TaskHandle<R: Send + 'static> {
  pub(crate) core: Arc<TaskCore<R>>,
}

impl<R: Send + 'static> TaskHandle<R> {
  /// Returns the unique ID of this task.
  pub fn id(&self) -> u64 {
    self.core.id()
  }

  /// True iff the task's completion signal has opened. Non-blocking, safe
  /// from any thread.
  pub fn is_completed(&self) -> bool {
    self.core.is_completed()
  }

  /// Blocks until the task completes and returns its outcome.
  ///
  /// Repeated calls return a clone of the same cached value, or repeat the
  /// same [`PoolError::TaskFailed`] wrapping the original panic message; the
  /// work is never re-executed.
  ///
  /// # Errors
  /// Returns [`PoolError::TaskFailed`] if the work panicked.
  /// Returns [`PoolError::PoolTerminated`] immediately, without blocking, if
  /// the pool shut down before this task was ever admitted to the queue; a
  /// task that was queued before shutdown still runs and is unaffected.
  pub fn result(&self) -> Result<R, PoolError>
  where
    R: Clone,
  {
    self.core.wait_result()
  }

  /// Creates a new task on the same pool whose work takes this task's result
  /// and applies `f` to it.
  ///
  /// The continuation is scheduled exactly once, triggered by this task's
  /// completion, whether this task is pending, running, or already complete
  /// when `continue_with` is called. If this task fails, the continuation
  /// completes with the same error without running `f`.
  pub fn continue_with<U, F>(&self, f: F) -> TaskHandle<U>
  where
    R: Clone,
    U: Send + 'static,
    F: FnOnce(R) -> U + Send + 'static,
  {
    let antecedent = Arc::clone(&self.core);
    let work: TaskWork<U> = Box::new(move || antecedent.wait_result().map(f));
    let continuation = TaskCore::new(Arc::clone(self.core.pool()), work);

    let scheduled = Arc::clone(&continuation);
    let schedule: TaskEntryPoint = Box::new(move || {
      let pool = Arc::clone(scheduled.pool());
      let task_id = scheduled.id();
      if let Err(error) = pool.schedule(Arc::clone(&scheduled)) {
        // Complete the continuation with the scheduling error so its handle
        // reports the failure instead of hanging.
        warn!(task_id, %error, "Continuation could not be scheduled; failing its handle.");
        scheduled.fail_unscheduled(error);
      }
    });
    self.core.register_continuation(schedule);

    TaskHandle { core: continuation }
  }
}

impl<R: Send + 'static> Clone for TaskHandle<R> {
  fn clone(&self) -> Self {
    Self {
      core: Arc::clone(&self.core),
    }
  }
}

impl<R: Send + 'static> fmt::Debug for TaskHandle<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskHandle")
      .field("task_id", &self.id())
      .field("completed", &self.is_completed())
      .finish()
  }
}
