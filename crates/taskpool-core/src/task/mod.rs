//! Task module: the user-facing task contract and the pool's internal record.

mod record;
mod result;

pub use record::{TaskFactory, TaskRecord};
pub use result::{Attempt, TaskResult};

use async_trait::async_trait;

use crate::error::TaskError;

/// A unit of work submitted to the pool.
///
/// `execute` may run several times (once per attempt). Exactly one of
/// `on_success` / `on_failure` is called, once, when no further attempts will
/// happen.
///
/// # Example
/// ```ignore
/// struct Ping;
///
/// #[async_trait]
/// impl Task for Ping {
///     async fn execute(&self) -> Result<(), TaskError> {
///         Ok(())
///     }
///
///     fn on_success(&self, result: &TaskResult) {
///         println!("{} ok after {} attempts", result.task_id(), result.attempts().len());
///     }
///
///     fn on_failure(&self, result: &TaskResult) {
///         println!("{} failed: {:?}", result.task_id(), result.error());
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    async fn execute(&self) -> Result<(), TaskError>;

    fn on_success(&self, result: &TaskResult);

    fn on_failure(&self, result: &TaskResult);
}
