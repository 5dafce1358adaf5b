use threads_orchestra::ThreadPoolManager;

use std::thread;
use std::time::Duration;

use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Continuation Chain Example ---");

  let pool = ThreadPoolManager::new(2, "continuation_pool");

  // Chain onto a task that is still running: the continuation is parked and
  // scheduled automatically once the antecedent completes.
  let fetch = pool
    .submit(|| {
      info!("Fetching the base value (simulated, 400ms)...");
      thread::sleep(Duration::from_millis(400));
      21
    })
    .unwrap();

  let doubled = fetch.continue_with(|value| {
    info!("Doubling {}", value);
    value * 2
  });
  let rendered = doubled.continue_with(|value| {
    info!("Rendering {}", value);
    format!("the answer is {}", value)
  });

  info!("Chain registered while the first task was still in flight.");
  info!("Final result: {:?}", rendered.result());

  // Chaining onto an already-completed task behaves the same way.
  let late = rendered.continue_with(|text| text.to_uppercase());
  info!("Late continuation result: {:?}", late.result());

  pool.shutdown();
  info!("Pool shut down. Example finished.");
}
