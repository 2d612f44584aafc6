//! RetryLoop - matured retries back into the FIFO queue
//!
//! # フロー
//! 1. While the retry queue is open, drain the records whose backoff elapsed
//!    and append them to the submission queue.
//! 2. Nothing matured: linger, or stop lingering as soon as the queue closes.
//! 3. After close: one final pass moves every remaining record (matured or
//!    not) to the submission queue, so nothing waits forever in the heap.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::queue::{RetryQueue, SubmitQueue};

pub(crate) async fn run(
    retry_queue: Arc<RetryQueue>,
    queue: Arc<SubmitQueue>,
    clock: Arc<dyn Clock>,
    linger: Duration,
) {
    while !retry_queue.is_closed().await {
        let matured = retry_queue.drain_matured(clock.now_ms()).await;
        if matured.is_empty() {
            tokio::select! {
                _ = retry_queue.closed() => {}
                _ = tokio::time::sleep(linger) => {}
            }
            continue;
        }
        debug!(count = matured.len(), "requeueing matured retries");
        queue.extend(matured).await;
    }

    let residual = retry_queue.drain_all().await;
    if !residual.is_empty() {
        info!(count = residual.len(), "flushing pending retries for shutdown");
        queue.extend(residual).await;
    }
    debug!("retry loop stopped");
}
