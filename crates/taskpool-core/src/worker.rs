use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::queue::RetryQueue;
use crate::task::TaskRecord;

/// Bounded executor for task records.
///
/// - At most `max_workers` executions run at once (semaphore gate).
/// - Each execution either completes the record (terminal callback) or parks
///   it in the retry queue.
/// - `wait_idle()` で実行中のタスクが全部終わるのを待てる
pub struct IoWorker {
    gate: Arc<Semaphore>,
    max_workers: usize,
    retry_queue: Arc<RetryQueue>,
    clock: Arc<dyn Clock>,
    in_flight: AtomicI64,
    /// Submitted-but-not-terminal tasks; owned by the pool, settled here.
    outstanding: Arc<AtomicUsize>,
    tracker: TaskTracker,
}

/// What happened to a record after one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Completed,
    Retrying,
}

impl IoWorker {
    pub fn new(
        max_workers: usize,
        retry_queue: Arc<RetryQueue>,
        clock: Arc<dyn Clock>,
        outstanding: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            retry_queue,
            clock,
            in_flight: AtomicI64::new(0),
            outstanding,
            tracker: TaskTracker::new(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of executions currently running.
    pub fn current_task_num(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for a free slot, then run the record in the background.
    ///
    /// The slot is released when the execution finishes, whatever the outcome.
    pub async fn submit(self: &Arc<Self>, record: TaskRecord) {
        let permit = match Arc::clone(&self.gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // gate is never closed; treat it like a shutdown-forced failure
                warn!(task_id = %record.id(), "worker gate closed, failing task");
                self.settle();
                record.complete();
                return;
            }
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let worker = Arc::clone(self);
        self.tracker.spawn(async move {
            let _permit = permit;
            let _in_flight = InFlight(&worker.in_flight);
            let mut pending = Pending {
                outstanding: &worker.outstanding,
                armed: true,
            };
            if worker.execute(record).await == Disposition::Retrying {
                pending.armed = false;
            }
        });
    }

    /// Run one attempt and classify the outcome.
    async fn execute(&self, mut record: TaskRecord) -> Disposition {
        let task = Arc::clone(record.task());
        let outcome = task.execute().await;
        let now_ms = self.clock.now_ms();

        let error = match outcome {
            Ok(()) => {
                record.mark_succeeded(now_ms);
                debug!(
                    task_id = %record.id(),
                    retries = record.attempt_count(),
                    "task succeeded"
                );
                record.complete();
                return Disposition::Completed;
            }
            Err(error) => error,
        };

        // retry queue が閉じていたら残り回数に関係なく失敗で確定
        if self.retry_queue.is_closed().await {
            warn!(task_id = %record.id(), %error, "task failed during shutdown, not retrying");
            record.mark_failed(error, now_ms);
            record.complete();
            return Disposition::Completed;
        }

        if !record.can_retry() {
            debug!(
                task_id = %record.id(),
                retries = record.attempt_count(),
                %error,
                "task failed, retries exhausted"
            );
            record.mark_failed(error, now_ms);
            record.complete();
            return Disposition::Completed;
        }

        record.mark_failed(error, now_ms);
        let backoff_ms = record.schedule_retry(now_ms);
        let task_id = record.id();
        let retry = record.attempt_count();
        match self.retry_queue.push(record).await {
            Ok(()) => {
                debug!(%task_id, retry, backoff_ms, "task failed, retry scheduled");
                Disposition::Retrying
            }
            Err(record) => {
                // closed between the check above and the push
                warn!(%task_id, "retry queue closed, failing task");
                record.complete();
                Disposition::Completed
            }
        }
    }

    /// Wait until every spawned execution has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    fn settle(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

struct InFlight<'a>(&'a AtomicI64);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Settles the outstanding count unless the record went back to the retry queue.
/// Also runs when a task panics, so admission does not leak capacity.
struct Pending<'a> {
    outstanding: &'a AtomicUsize,
    armed: bool,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
