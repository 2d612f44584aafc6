//! Task record: retry metadata + the user task.

use std::sync::Arc;

use super::{Attempt, Task, TaskResult};
use crate::clock::Clock;
use crate::config::PoolConfig;
use crate::error::TaskError;
use crate::ids::{IdGenerator, TaskId};
use crate::queue::BackoffPolicy;

/// Pool-side wrapper around a submitted task.
///
/// Design:
/// - Moved by value between the FIFO queue, a worker slot and the retry queue,
///   so it is owned by exactly one of them at any time.
/// - Only the worker mutates it.
/// - `complete()` consumes the record, so the terminal callback runs at most once.
pub struct TaskRecord {
    id: TaskId,

    /// Number of failed attempts that were followed by a retry.
    attempt_count: u32,
    max_reserved_attempts: u32,
    max_retry_times: u32,
    backoff: BackoffPolicy,

    created_at_ms: i64,

    /// When the record becomes eligible again; `0` until the first retry is scheduled.
    next_retry_at_ms: i64,

    result: TaskResult,
    task: Arc<dyn Task>,
}

impl TaskRecord {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_retry_times(&self) -> u32 {
        self.max_retry_times
    }

    pub fn max_reserved_attempts(&self) -> u32 {
        self.max_reserved_attempts
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn next_retry_at_ms(&self) -> i64 {
        self.next_retry_at_ms
    }

    pub fn result(&self) -> &TaskResult {
        &self.result
    }

    pub(crate) fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Are retries left in the budget?
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_retry_times
    }

    /// Record a successful attempt.
    pub(crate) fn mark_succeeded(&mut self, now_ms: i64) {
        self.reserve(Attempt::success(now_ms));
        self.result.set_successful(true);
    }

    /// Record a failed attempt.
    pub(crate) fn mark_failed(&mut self, error: TaskError, now_ms: i64) {
        self.reserve(Attempt::failure(error, now_ms));
        self.result.set_successful(false);
    }

    /// Consume one retry and compute when the record matures again.
    ///
    /// Returns the backoff in milliseconds.
    pub(crate) fn schedule_retry(&mut self, now_ms: i64) -> i64 {
        self.attempt_count += 1;
        let backoff_ms = self.backoff.delay_ms(self.attempt_count);
        // 0 is reserved for "never scheduled"
        self.next_retry_at_ms = now_ms.saturating_add(backoff_ms).max(1);
        backoff_ms
    }

    /// Fire the terminal callback.
    pub(crate) fn complete(self) {
        if self.result.is_successful() {
            self.task.on_success(&self.result);
        } else {
            self.task.on_failure(&self.result);
        }
    }

    fn reserve(&mut self, attempt: Attempt) {
        if self.attempt_count < self.max_reserved_attempts {
            self.result.push_attempt(attempt);
        }
    }
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("attempt_count", &self.attempt_count)
            .field("max_retry_times", &self.max_retry_times)
            .field("next_retry_at_ms", &self.next_retry_at_ms)
            .field("successful", &self.result.is_successful())
            .finish_non_exhaustive()
    }
}

/// Stamps user tasks into [`TaskRecord`]s.
///
/// Retry parameters are copied from the config once, when the pool is built.
pub struct TaskFactory {
    max_reserved_attempts: u32,
    max_retry_times: u32,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl TaskFactory {
    pub fn new(config: &PoolConfig, clock: Arc<dyn Clock>, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            max_reserved_attempts: config.max_reserved_attempts,
            max_retry_times: config.max_retry_times,
            backoff: BackoffPolicy::new(config.base_retry_backoff_ms, config.max_retry_backoff_ms),
            clock,
            ids,
        }
    }

    pub fn produce(&self, task: Arc<dyn Task>) -> TaskRecord {
        let id = self.ids.generate_task_id();
        TaskRecord {
            id,
            attempt_count: 0,
            max_reserved_attempts: self.max_reserved_attempts,
            max_retry_times: self.max_retry_times,
            backoff: self.backoff,
            created_at_ms: self.clock.now_ms(),
            next_retry_at_ms: 0,
            result: TaskResult::new(id),
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{FlakyTask, factory};

    #[test]
    fn produce_copies_config_and_stamps_time() {
        let clock = ManualClock::new(5_000);
        let config = PoolConfig {
            max_reserved_attempts: 4,
            max_retry_times: 3,
            base_retry_backoff_ms: 100,
            max_retry_backoff_ms: 1000,
            ..PoolConfig::default()
        };
        let record = factory(&config, &clock).produce(FlakyTask::new(0));

        assert_eq!(record.attempt_count(), 0);
        assert_eq!(record.next_retry_at_ms(), 0);
        assert_eq!(record.created_at_ms(), 5_000);
        assert_eq!(record.max_reserved_attempts(), 4);
        assert_eq!(record.max_retry_times(), 3);
        assert_eq!(record.backoff(), BackoffPolicy::new(100, 1000));
        assert_eq!(record.result().task_id(), record.id());
        assert!(record.can_retry());
    }

    #[test]
    fn schedule_retry_doubles_from_base() {
        let clock = ManualClock::new(1_000);
        let config = PoolConfig {
            max_retry_times: 3,
            base_retry_backoff_ms: 100,
            max_retry_backoff_ms: 1000,
            ..PoolConfig::default()
        };
        let mut record = factory(&config, &clock).produce(FlakyTask::new(0));

        assert_eq!(record.schedule_retry(1_000), 100);
        assert_eq!(record.next_retry_at_ms(), 1_100);
        assert_eq!(record.schedule_retry(2_000), 200);
        assert_eq!(record.next_retry_at_ms(), 2_200);
        assert_eq!(record.schedule_retry(3_000), 400);
        assert_eq!(record.attempt_count(), 3);
        assert!(!record.can_retry());
    }

    #[test]
    fn history_is_capped_by_reserved_attempts() {
        let clock = ManualClock::new(0);
        let config = PoolConfig {
            max_reserved_attempts: 1,
            max_retry_times: 5,
            ..PoolConfig::default()
        };
        let mut record = factory(&config, &clock).produce(FlakyTask::new(0));

        record.mark_failed("e1".into(), 10);
        record.schedule_retry(10);
        record.mark_failed("e2".into(), 20);
        record.schedule_retry(20);
        record.mark_succeeded(30);

        assert_eq!(record.result().attempts().len(), 1);
        assert_eq!(record.result().attempts()[0].timestamp_ms(), 10);
        assert!(record.result().is_successful());
    }

    #[test]
    fn complete_dispatches_on_outcome() {
        let clock = ManualClock::new(0);
        let factory = factory(&PoolConfig::default(), &clock);

        let ok_task = FlakyTask::new(0);
        let mut ok = factory.produce(ok_task.clone());
        ok.mark_succeeded(1);
        ok.complete();

        let failed_task = FlakyTask::new(0);
        let mut failed = factory.produce(failed_task.clone());
        failed.mark_failed("boom".into(), 2);
        failed.complete();

        let ok_results = ok_task.terminal();
        assert_eq!(ok_results.len(), 1);
        assert!(ok_results[0].is_successful());

        let failed_results = failed_task.terminal();
        assert_eq!(failed_results.len(), 1);
        assert!(!failed_results[0].is_successful());
        assert_eq!(failed_results[0].error().map(|e| e.message()), Some("boom"));
    }
}
