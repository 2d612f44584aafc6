//! TaskPool - submission, dispatch, retry and shutdown in one lifecycle
//!
//! # 主要コンポーネント
//! - **dispatch_loop**: FIFO queue → worker slots
//! - **retry_loop**: retry queue → FIFO queue
//! - **admission**: backpressure on `push_task`
//!
//! # Shutdown
//! 1. close the retry queue, wait for the retry loop (pending retries are
//!    flushed into the FIFO queue)
//! 2. stop the dispatch loop once the FIFO queue is empty
//! 3. wait for the in-flight executions

mod admission;
mod dispatch_loop;
mod retry_loop;
mod state;

pub use self::state::PoolState;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::ids::{TaskId, UlidGenerator};
use crate::queue::{RetryQueue, SubmitQueue};
use crate::task::{Task, TaskFactory};
use crate::worker::IoWorker;

/// Background loop handles; `None` once a loop has been joined.
#[derive(Default)]
struct Loops {
    dispatch: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

/// Bounded-concurrency task pool with retry and backoff.
///
/// # 使用例
/// ```ignore
/// let pool = TaskPool::new(PoolConfig::default())?;
/// pool.start().await?;
/// pool.push_task(Arc::new(MyTask::new())).await?;
/// pool.safe_close().await;
/// ```
pub struct TaskPool {
    config: PoolConfig,
    factory: TaskFactory,
    clock: Arc<dyn Clock>,
    queue: Arc<SubmitQueue>,
    retry_queue: Arc<RetryQueue>,
    worker: Arc<IoWorker>,
    outstanding: Arc<AtomicUsize>,
    dispatch_shutdown: Arc<AtomicBool>,
    /// Held for reading while a push lands in the FIFO queue, for writing on
    /// state transitions. A push can never slip in behind the drain.
    state: RwLock<PoolState>,
    /// Lock order: `loops` before `state`.
    loops: Mutex<Loops>,
}

impl TaskPool {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PoolConfig, clock: Arc<dyn Clock>) -> Result<Self, PoolError> {
        config.validate()?;

        let factory = TaskFactory::new(
            &config,
            Arc::clone(&clock),
            Box::new(UlidGenerator::new(Arc::clone(&clock))),
        );
        let retry_queue = Arc::new(RetryQueue::new());
        let outstanding = Arc::new(AtomicUsize::new(0));
        let worker = Arc::new(IoWorker::new(
            config.max_io_worker_num,
            Arc::clone(&retry_queue),
            Arc::clone(&clock),
            Arc::clone(&outstanding),
        ));

        Ok(Self {
            config,
            factory,
            clock,
            queue: Arc::new(SubmitQueue::new()),
            retry_queue,
            worker,
            outstanding,
            dispatch_shutdown: Arc::new(AtomicBool::new(false)),
            state: RwLock::new(PoolState::Created),
            loops: Mutex::new(Loops::default()),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Launch the dispatch and retry loops.
    pub async fn start(&self) -> Result<(), PoolError> {
        let mut loops = self.loops.lock().await;
        let mut state = self.state.write().await;
        if *state != PoolState::Created {
            return Err(PoolError::InvalidState {
                expected: PoolState::Created.as_str(),
                found: state.as_str(),
            });
        }
        *state = PoolState::Running;
        drop(state);

        self.spawn_loops(&mut loops);
        info!(
            max_io_worker_num = self.config.max_io_worker_num,
            max_retry_times = self.config.max_retry_times,
            "task pool started"
        );
        Ok(())
    }

    /// Submit a task.
    ///
    /// Applies admission control first (see [`PoolConfig::admission`]). Tasks
    /// pushed before `start()` wait in the queue.
    pub async fn push_task(&self, task: Arc<dyn Task>) -> Result<TaskId, PoolError> {
        if !self.state.read().await.accepts_tasks() {
            return Err(PoolError::Closed);
        }

        admission::reserve(
            self.config.admission(),
            self.config.max_task_num,
            &self.outstanding,
        )
        .await?;

        let state = self.state.read().await;
        if !state.accepts_tasks() {
            // closed while we were waiting for capacity
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::Closed);
        }
        let record = self.factory.produce(task);
        let task_id = record.id();
        self.queue.push(record).await;
        drop(state);

        debug!(%task_id, "task submitted");
        Ok(task_id)
    }

    /// Drain everything and stop. Blocks until every submitted task got its
    /// terminal callback; no timeout.
    pub async fn safe_close(&self) {
        let mut loops = self.loops.lock().await;
        if !self.begin_draining(&mut loops).await {
            return;
        }
        self.drain(&mut loops).await;
        self.finish().await;
    }

    /// Like [`safe_close`](Self::safe_close), but gives up after `timeout`.
    ///
    /// On timeout the pool stays in `Draining` with its background work still
    /// running; call `safe_close` or `close` again to finish the drain.
    pub async fn close(&self, timeout: Duration) -> Result<(), PoolError> {
        let mut loops = self.loops.lock().await;
        if !self.begin_draining(&mut loops).await {
            return Ok(());
        }

        match tokio::time::timeout(timeout, self.drain(&mut loops)).await {
            Ok(()) => {
                self.finish().await;
                Ok(())
            }
            Err(_) => {
                let in_flight = self.worker.current_task_num();
                let queued = self.queue.len() + self.retry_queue.len().await;
                warn!(in_flight, queued, ?timeout, "task pool close timed out");
                Err(PoolError::ShutdownTimeout { in_flight, queued })
            }
        }
    }

    pub async fn state(&self) -> PoolState {
        *self.state.read().await
    }

    /// Number of executions currently running.
    pub fn current_task_num(&self) -> i64 {
        self.worker.current_task_num()
    }

    /// Tasks submitted that have not reached their terminal callback yet.
    pub fn outstanding_task_num(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Records waiting in the FIFO queue (may be slightly stale).
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Records waiting for their retry backoff.
    pub async fn retry_queue_len(&self) -> usize {
        self.retry_queue.len().await
    }

    fn spawn_loops(&self, loops: &mut Loops) {
        loops.dispatch = Some(tokio::spawn(dispatch_loop::run(
            Arc::clone(&self.queue),
            Arc::clone(&self.worker),
            Arc::clone(&self.dispatch_shutdown),
        )));
        loops.retry = Some(tokio::spawn(retry_loop::run(
            Arc::clone(&self.retry_queue),
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
            self.config.linger(),
        )));
    }

    /// Move to Draining. Returns `false` if the pool is already stopped.
    async fn begin_draining(&self, loops: &mut Loops) -> bool {
        let mut state = self.state.write().await;
        let current = *state;
        match current {
            PoolState::Stopped => return false,
            PoolState::Draining => {}
            PoolState::Running => *state = PoolState::Draining,
            PoolState::Created => {
                // never started: the loops still have to drain what was pushed
                *state = PoolState::Draining;
                drop(state);
                self.spawn_loops(loops);
            }
        }
        info!(
            queued = self.queue.len(),
            in_flight = self.worker.current_task_num(),
            "task pool draining"
        );
        true
    }

    /// Shutdown steps 1-3. Safe to re-run after a cancelled (timed out) attempt.
    async fn drain(&self, loops: &mut Loops) {
        self.retry_queue.close().await;
        if let Some(handle) = loops.retry.as_mut() {
            if let Err(e) = handle.await {
                warn!(error = %e, "retry loop terminated abnormally");
            }
            loops.retry = None;
        }

        self.dispatch_shutdown.store(true, Ordering::SeqCst);
        self.queue.wake();
        if let Some(handle) = loops.dispatch.as_mut() {
            if let Err(e) = handle.await {
                warn!(error = %e, "dispatch loop terminated abnormally");
            }
            loops.dispatch = None;
        }

        self.worker.wait_idle().await;
    }

    async fn finish(&self) {
        *self.state.write().await = PoolState::Stopped;
        info!("task pool stopped");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        let loops = self.loops.get_mut();
        if loops.dispatch.is_some() || loops.retry.is_some() {
            warn!("task pool dropped without close; pending tasks are abandoned");
            for handle in [loops.dispatch.take(), loops.retry.take()].into_iter().flatten() {
                handle.abort();
            }
        }
    }
}
