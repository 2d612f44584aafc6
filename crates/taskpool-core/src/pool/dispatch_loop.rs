//! DispatchLoop - FIFO queue から worker slot へ
//!
//! # フロー
//! 1. Pop the head of the submission queue.
//! 2. Hand it to the worker (waits for a free slot).
//! 3. Queue empty: exit if shutdown was requested, otherwise idle until a
//!    push wakes us or `IDLE_INTERVAL` passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::queue::SubmitQueue;
use crate::worker::IoWorker;

pub(crate) const IDLE_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) async fn run(queue: Arc<SubmitQueue>, worker: Arc<IoWorker>, shutdown: Arc<AtomicBool>) {
    loop {
        if let Some(record) = queue.pop().await {
            worker.submit(record).await;
            continue;
        }

        // queue is empty here; the retry loop has already stopped once the flag is set
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            _ = queue.notified() => {}
            _ = tokio::time::sleep(IDLE_INTERVAL) => {}
        }
    }
    debug!("dispatch loop stopped");
}
