//! FIFO submission queue shared by fresh submissions and matured retries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify};

use crate::task::TaskRecord;

pub struct SubmitQueue {
    records: Mutex<VecDeque<TaskRecord>>,
    /// Mirror of the length, readable without the lock (may be stale).
    len: AtomicUsize,
    notify: Notify,
}

impl SubmitQueue {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Append at the tail and wake the dispatcher.
    pub async fn push(&self, record: TaskRecord) {
        let mut records = self.records.lock().await;
        records.push_back(record);
        self.len.store(records.len(), Ordering::Release);
        drop(records);
        self.notify.notify_one();
    }

    /// Append several records, keeping their order.
    pub async fn extend(&self, batch: Vec<TaskRecord>) {
        if batch.is_empty() {
            return;
        }
        let mut records = self.records.lock().await;
        records.extend(batch);
        self.len.store(records.len(), Ordering::Release);
        drop(records);
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> Option<TaskRecord> {
        let mut records = self.records.lock().await;
        let record = records.pop_front();
        self.len.store(records.len(), Ordering::Release);
        record
    }

    /// Wait until something is pushed.
    ///
    /// A push that happened while nobody was waiting is remembered, so this never
    /// misses a wake-up; it may return spuriously.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Wake a waiting dispatcher without pushing (used on shutdown).
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Lock-free length; only good for monitoring and idle decisions.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubmitQueue {
    fn default() -> Self {
        Self::new()
    }
}
