//! Shared test fixtures.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::{Clock, ManualClock};
use crate::config::PoolConfig;
use crate::error::TaskError;
use crate::ids::UlidGenerator;
use crate::task::{Task, TaskFactory, TaskResult};

/// Fails a fixed number of times, then succeeds.
///
/// Tracks how often it ran, how many executions overlapped, and every
/// terminal callback it received.
pub(crate) struct FlakyTask {
    failures_left: AtomicU32,
    executions: AtomicU32,
    running: AtomicI32,
    max_running: AtomicI32,
    work: Duration,
    terminal: Mutex<Vec<TaskResult>>,
}

impl FlakyTask {
    pub(crate) fn new(failures: u32) -> Arc<Self> {
        Self::with_work(failures, Duration::ZERO)
    }

    pub(crate) fn always_failing() -> Arc<Self> {
        Self::new(u32::MAX)
    }

    /// Each execution sleeps for `work` before reporting.
    pub(crate) fn with_work(failures: u32, work: Duration) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            executions: AtomicU32::new(0),
            running: AtomicI32::new(0),
            max_running: AtomicI32::new(0),
            work,
            terminal: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn executions(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }

    pub(crate) fn max_running(&self) -> i32 {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Terminal callbacks received so far.
    pub(crate) fn terminal(&self) -> Vec<TaskResult> {
        self.terminal.lock().unwrap().clone()
    }
}

#[async_trait]
impl Task for FlakyTask {
    async fn execute(&self) -> Result<(), TaskError> {
        let n = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(TaskError::new(format!("intentional failure #{n}")));
        }
        Ok(())
    }

    fn on_success(&self, result: &TaskResult) {
        self.terminal.lock().unwrap().push(result.clone());
    }

    fn on_failure(&self, result: &TaskResult) {
        self.terminal.lock().unwrap().push(result.clone());
    }
}

pub(crate) fn factory(config: &PoolConfig, clock: &ManualClock) -> TaskFactory {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    TaskFactory::new(
        config,
        Arc::clone(&clock),
        Box::new(UlidGenerator::new(clock)),
    )
}

/// Small, fast config for end-to-end tests.
pub(crate) fn fast_config() -> PoolConfig {
    PoolConfig {
        max_reserved_attempts: 11,
        max_retry_times: 3,
        base_retry_backoff_ms: 20,
        max_retry_backoff_ms: 200,
        max_io_worker_num: 4,
        max_task_num: 0,
        max_block_sec: 0,
        linger_ms: 5,
    }
}
