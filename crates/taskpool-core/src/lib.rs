//! taskpool-core
//!
//! In-process task pool: bounded concurrency, retry with exponential backoff,
//! and a graceful two-phase shutdown.
//!
//! # モジュール構成
//! - **task**: `Task` trait（ユーザー実装）, `TaskRecord`, `TaskResult`
//! - **queue**: FIFO submission queue, retry heap, backoff math
//! - **worker**: `IoWorker` - semaphore-gated executor
//! - **pool**: `TaskPool` - lifecycle, dispatch / retry loops, admission control
//! - **config**: `PoolConfig`（serde, JSON から読める）
//! - **clock** / **ids**: time source and ULID task ids
//! - **error**: `PoolError`, `TaskError`

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod pool;
pub mod queue;
pub mod task;
pub mod worker;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdmissionPolicy, PoolConfig};
pub use error::{PoolError, TaskError};
pub use ids::TaskId;
pub use pool::{PoolState, TaskPool};
pub use task::{Attempt, Task, TaskResult};
