use threads_orchestra::{PoolError, ThreadPoolManager};

use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Task Panic Example ---");

  let pool = ThreadPoolManager::new(1, "panic_pool");

  let failing = pool
    .submit(|| -> String {
      info!("This task is about to panic.");
      panic!("something went wrong in the task")
    })
    .unwrap();

  // The panic is captured inside the worker and deferred until the result is
  // demanded; the worker itself survives.
  match failing.result() {
    Err(PoolError::TaskFailed(message)) => {
      info!("Captured task failure with original cause: {}", message)
    }
    other => info!("Unexpected outcome: {:?}", other),
  }
  info!("Asking again yields the same failure: {:?}", failing.result());

  let healthy = pool.submit(|| "the worker is still alive".to_string()).unwrap();
  info!("Follow-up task result: {:?}", healthy.result());

  pool.shutdown();
  info!("Example finished.");
}
