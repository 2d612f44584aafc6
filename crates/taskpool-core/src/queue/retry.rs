//! Retry queue: records waiting for their backoff to elapse.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::sync::{Mutex, Notify};

use crate::task::TaskRecord;

/// Heap entry.
///
/// We use reverse ordering so BinaryHeap acts as a min-heap (earliest first).
/// `seq` breaks ties so records due at the same instant come out in push order.
struct Scheduled {
    next_retry_at_ms: i64,
    seq: u64,
    record: TaskRecord,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .next_retry_at_ms
            .cmp(&self.next_retry_at_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct RetryState {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
    closed: bool,
}

/// Time-ordered queue of records awaiting their next retry.
///
/// The shutdown flag lives under the same lock as the heap: a worker either
/// gets its record in before `close()`, or gets it handed back and must treat
/// the task as terminal. Nothing can slip in after the final drain.
pub struct RetryQueue {
    state: Mutex<RetryState>,
    closed_notify: Notify,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RetryState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            closed_notify: Notify::new(),
        }
    }

    /// Insert a record keyed by its `next_retry_at_ms`.
    ///
    /// Hands the record back if the queue is already closed.
    pub async fn push(&self, record: TaskRecord) -> Result<(), TaskRecord> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(record);
        }
        debug_assert!(record.next_retry_at_ms() > 0);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Scheduled {
            next_retry_at_ms: record.next_retry_at_ms(),
            seq,
            record,
        });
        Ok(())
    }

    /// Remove every record whose retry time is strictly before `now_ms`.
    ///
    /// Stops at the first immature minimum; heap order guarantees nothing
    /// behind it has matured either.
    pub async fn drain_matured(&self, now_ms: i64) -> Vec<TaskRecord> {
        let mut state = self.state.lock().await;
        let mut matured = Vec::new();
        while let Some(entry) = state.heap.peek() {
            if entry.next_retry_at_ms >= now_ms {
                break;
            }
            if let Some(entry) = state.heap.pop() {
                matured.push(entry.record);
            }
        }
        matured
    }

    /// Remove every record regardless of maturity, earliest first.
    pub async fn drain_all(&self) -> Vec<TaskRecord> {
        let mut state = self.state.lock().await;
        let heap = std::mem::take(&mut state.heap);
        heap.into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.record)
            .collect()
    }

    /// Earliest pending retry time, if any.
    pub async fn next_due_ms(&self) -> Option<i64> {
        let state = self.state.lock().await;
        state.heap.peek().map(|entry| entry.next_retry_at_ms)
    }

    /// Set the shutdown flag. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        drop(state);
        // notify_one stores a permit, so a scan loop that is not parked yet
        // still sees the wake-up.
        self.closed_notify.notify_one();
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Resolves after `close()` has been called (used to cut the scan loop's linger short).
    pub(crate) async fn closed(&self) {
        self.closed_notify.notified().await;
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}
