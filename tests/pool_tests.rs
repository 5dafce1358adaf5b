use threads_orchestra::{PoolError, TaskHandle, ThreadPoolManager};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Helper to initialize tracing for tests (call once per test run, not per test
// function). Each test calls it, but Once ensures it runs once.
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,threads_orchestra=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

#[test]
fn test_submit_and_result_basic_task() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(2, "test_pool_basic_submit");

  let handle = pool.submit(|| 1 + 2).unwrap();
  assert_eq!(handle.result(), Ok(3));
  assert!(handle.is_completed());

  pool.shutdown();
}

#[test]
fn test_result_is_idempotent_and_work_runs_once() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(2, "test_pool_idempotent_result");

  let executions = Arc::new(AtomicUsize::new(0));
  let executions_in_task = executions.clone();
  let handle = pool
    .submit(move || {
      executions_in_task.fetch_add(1, Ordering::SeqCst);
      "computed".to_string()
    })
    .unwrap();

  assert_eq!(handle.result(), Ok("computed".to_string()));
  assert_eq!(handle.result(), Ok("computed".to_string()));
  assert_eq!(handle.result(), Ok("computed".to_string()));
  assert_eq!(
    executions.load(Ordering::SeqCst),
    1,
    "Work must run exactly once no matter how often the result is read."
  );

  pool.shutdown();
}

#[test]
fn test_task_panics_are_captured_and_repeat_identically() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(1, "test_pool_panic_handling");

  let handle: TaskHandle<String> = pool.submit(|| panic!("boom")).unwrap();

  let first = handle.result();
  assert_eq!(first, Err(PoolError::TaskFailed("boom".to_string())));
  let second = handle.result();
  assert_eq!(second, first, "Repeated result() calls must repeat the same wrapped cause.");

  // The worker survives the panic and keeps serving tasks.
  let next = pool.submit(|| 7usize).unwrap();
  assert_eq!(next.result(), Ok(7));

  pool.shutdown();
}

#[test]
fn test_panic_with_string_payload_preserves_message() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(1, "test_pool_panic_string_payload");

  let value = 41;
  let handle: TaskHandle<()> = pool.submit(move || panic!("bad input: {}", value)).unwrap();
  assert_eq!(
    handle.result(),
    Err(PoolError::TaskFailed("bad input: 41".to_string()))
  );

  pool.shutdown();
}

#[test]
fn test_submit_after_shutdown_fails_immediately() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(1, "test_pool_submit_after_shutdown");
  pool.shutdown();

  let ran = Arc::new(AtomicBool::new(false));
  let ran_in_task = ran.clone();
  let submit_result = pool.submit(move || {
    ran_in_task.store(true, Ordering::SeqCst);
    42
  });

  match submit_result {
    Err(PoolError::PoolTerminated) => {}
    other => panic!("Expected PoolTerminated, got {:?}", other),
  }
  assert!(!ran.load(Ordering::SeqCst), "Rejected work must never run.");
}

#[test]
fn test_tasks_enqueued_before_shutdown_still_complete() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(1, "test_pool_drain_on_shutdown");

  // Occupy the single worker so the next submissions stay queued.
  let blocker = pool
    .submit(|| {
      thread::sleep(Duration::from_millis(150));
      "blocker_done".to_string()
    })
    .unwrap();
  thread::sleep(Duration::from_millis(30));

  let queued_flag_one = Arc::new(AtomicBool::new(false));
  let queued_flag_two = Arc::new(AtomicBool::new(false));
  let flag_one = queued_flag_one.clone();
  let flag_two = queued_flag_two.clone();
  let queued_one = pool
    .submit(move || {
      flag_one.store(true, Ordering::SeqCst);
      1
    })
    .unwrap();
  let queued_two = pool
    .submit(move || {
      flag_two.store(true, Ordering::SeqCst);
      2
    })
    .unwrap();

  pool.shutdown();

  assert_eq!(blocker.result(), Ok("blocker_done".to_string()));
  assert_eq!(queued_one.result(), Ok(1));
  assert_eq!(queued_two.result(), Ok(2));
  assert!(queued_flag_one.load(Ordering::SeqCst));
  assert!(queued_flag_two.load(Ordering::SeqCst));
}

#[test]
fn test_in_flight_work_survives_shutdown() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(1, "test_pool_in_flight_survives");

  let handle = pool
    .submit(|| {
      thread::sleep(Duration::from_millis(300));
      "slow_done".to_string()
    })
    .unwrap();

  thread::sleep(Duration::from_millis(50));
  let shutdown_started = Instant::now();
  pool.shutdown();
  assert!(
    shutdown_started.elapsed() >= Duration::from_millis(200),
    "Shutdown must block until the in-flight task finishes."
  );

  assert_eq!(handle.result(), Ok("slow_done".to_string()));
}

#[test]
fn test_shutdown_blocks_until_all_workers_exit() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(2, "test_pool_shutdown_joins_workers");

  for _ in 0..4 {
    pool
      .submit(|| {
        thread::sleep(Duration::from_millis(100));
      })
      .unwrap();
  }

  pool.shutdown();
  assert_eq!(pool.active_task_count(), 0);
  assert_eq!(pool.queued_task_count(), 0);
}

#[test]
fn test_double_shutdown_is_safe() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(2, "test_pool_double_shutdown");

  let handle = pool.submit(|| 5).unwrap();
  pool.shutdown();
  pool.shutdown();
  assert_eq!(handle.result(), Ok(5));
}

#[test]
fn test_worker_count_is_clamped_to_one() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(0, "test_pool_clamped_workers");
  assert_eq!(pool.worker_count(), 1);
  assert_eq!(pool.name(), "test_pool_clamped_workers");

  let handle = pool.submit(|| "still runs".to_string()).unwrap();
  assert_eq!(handle.result(), Ok("still runs".to_string()));

  pool.shutdown();
}

#[test]
fn test_many_tasks_each_execute_exactly_once() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(4, "test_pool_exactly_once_many");

  let executions = Arc::new(AtomicUsize::new(0));
  let mut handles = Vec::new();
  for i in 0..100usize {
    let executions_in_task = executions.clone();
    handles.push(
      pool
        .submit(move || {
          executions_in_task.fetch_add(1, Ordering::SeqCst);
          i * 2
        })
        .unwrap(),
    );
  }

  for (i, handle) in handles.iter().enumerate() {
    assert_eq!(handle.result(), Ok(i * 2));
  }
  assert_eq!(executions.load(Ordering::SeqCst), 100);

  pool.shutdown();
}

#[test]
fn test_cloned_handles_observe_the_same_outcome() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(2, "test_pool_cloned_handles");

  let handle = pool
    .submit(|| {
      thread::sleep(Duration::from_millis(50));
      99
    })
    .unwrap();
  let second_observer = handle.clone();

  let reader = thread::spawn(move || second_observer.result());
  assert_eq!(handle.result(), Ok(99));
  assert_eq!(reader.join().unwrap(), Ok(99));

  pool.shutdown();
}

#[test]
fn test_queued_and_active_counts() {
  setup_tracing_for_test();
  let pool = ThreadPoolManager::new(1, "test_pool_counts");

  let mut handles = Vec::new();
  for _ in 0..3 {
    handles.push(
      pool
        .submit(|| {
          thread::sleep(Duration::from_millis(100));
        })
        .unwrap(),
    );
  }

  thread::sleep(Duration::from_millis(30));
  assert_eq!(pool.active_task_count(), 1);
  assert_eq!(pool.queued_task_count(), 2);

  for handle in &handles {
    handle.result().unwrap();
  }

  // The worker decrements the active count after the completion signal
  // opens; shutdown joins it, so the counts are settled afterwards.
  pool.shutdown();
  assert_eq!(pool.active_task_count(), 0);
  assert_eq!(pool.queued_task_count(), 0);
}

#[test]
fn test_drop_without_shutdown_lets_admitted_work_finish() {
  setup_tracing_for_test();

  let completed = Arc::new(AtomicBool::new(false));
  let handle = {
    let pool = ThreadPoolManager::new(1, "test_pool_drop_cleanup");
    let completed_in_task = completed.clone();
    let handle = pool
      .submit(move || {
        thread::sleep(Duration::from_millis(100));
        completed_in_task.store(true, Ordering::SeqCst);
        "survived_drop".to_string()
      })
      .unwrap();
    // Pool is dropped here without an explicit shutdown; the worker drains
    // what was admitted and exits detached.
    handle
  };

  assert_eq!(handle.result(), Ok("survived_drop".to_string()));
  assert!(completed.load(Ordering::SeqCst));
}
