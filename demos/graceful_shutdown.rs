use threads_orchestra::ThreadPoolManager;

use std::thread;
use std::time::Duration;

use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Graceful Shutdown Example ---");

  let pool = ThreadPoolManager::new(1, "shutdown_pool");

  // One task in flight, two waiting in the queue.
  let mut handles = Vec::new();
  for i in 0..3 {
    let handle = pool
      .submit(move || {
        info!("Task {} running (300ms)...", i);
        thread::sleep(Duration::from_millis(300));
        format!("task_{}_done", i)
      })
      .unwrap();
    handles.push(handle);
  }

  thread::sleep(Duration::from_millis(50));
  info!(
    "Before shutdown: {} active, {} queued.",
    pool.active_task_count(),
    pool.queued_task_count()
  );

  // Blocks until everything admitted above has run and every worker exited.
  pool.shutdown();
  info!("Shutdown returned; the queue was drained, not discarded.");

  for handle in &handles {
    info!("Result for task {}: {:?}", handle.id(), handle.result());
  }

  // New submissions are rejected now.
  match pool.submit(|| 42) {
    Err(e) => info!("Submission after shutdown rejected as expected: {:?}", e),
    Ok(_) => unreachable!("submission after shutdown must fail"),
  }

  info!("Example finished.");
}
