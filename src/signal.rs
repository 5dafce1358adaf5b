use parking_lot::{Condvar, Mutex};

/// A one-shot, thread-safe completion gate with a blocking wait.
///
/// The gate starts closed, is opened exactly once, and stays open. Opening
/// happens under the mutex and wakes every waiter, so anything written before
/// [`open`](Self::open) is visible to a thread that returns from
/// [`wait`](Self::wait) or observes [`is_open`](Self::is_open) as true.
#[derive(Debug, Default)]
pub(crate) struct CompletionSignal {
  opened: Mutex<bool>,
  condvar: Condvar,
}

impl CompletionSignal {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Opens the gate and wakes all current and future waiters. Idempotent.
  pub(crate) fn open(&self) {
    let mut opened = self.opened.lock();
    *opened = true;
    self.condvar.notify_all();
  }

  /// Non-blocking check, safe from any thread.
  pub(crate) fn is_open(&self) -> bool {
    *self.opened.lock()
  }

  /// Blocks the calling thread until the gate opens. Returns immediately if
  /// it is already open.
  pub(crate) fn wait(&self) {
    let mut opened = self.opened.lock();
    while !*opened {
      self.condvar.wait(&mut opened);
    }
  }
}
