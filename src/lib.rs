//! A thread-backed pool for running blocking closures with queuing,
//! result handles and continuation chaining.

mod error;
mod handle;
mod manager;
mod signal;
mod task;

pub use error::PoolError;
pub use handle::TaskHandle;
pub use manager::ThreadPoolManager;
