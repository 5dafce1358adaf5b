use thiserror::Error;

/// Errors that can occur within the `threads_orchestra` pool.
///
/// The enum is `Clone` because a failed task hands out its error to every
/// caller of [`TaskHandle::result`](crate::TaskHandle::result), not just the
/// first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  /// The pool is shutting down or already shut down. Raised synchronously by
  /// `submit`, and by `result()` on a task the pool will never get to run.
  #[error("Pool is shutting down or already shut down, cannot accept new tasks")]
  PoolTerminated,

  /// The task's work panicked. Carries the original panic message verbatim;
  /// surfaced on every `result()` call for the task.
  #[error("Task execution failed: {0}")]
  TaskFailed(String),

  /// The pool's internal task queue disconnected for a reason other than
  /// shutdown. Should not happen in practice.
  #[error("Pool's internal task queue disconnected unexpectedly")]
  QueueDisconnected,
}
