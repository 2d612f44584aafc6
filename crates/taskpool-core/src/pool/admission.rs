//! Admission control: backpressure on `push_task`.
//!
//! Counts outstanding tasks (queued, waiting for a retry, or executing) against
//! `max_task_num`. A slot is reserved before the task is queued and released
//! by the worker when the task reaches its terminal callback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::AdmissionPolicy;
use crate::error::PoolError;

/// How often a blocked `push_task` re-checks capacity.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reserve one outstanding slot according to `policy`.
pub(crate) async fn reserve(
    policy: AdmissionPolicy,
    limit: usize,
    outstanding: &AtomicUsize,
) -> Result<(), PoolError> {
    let deadline = match policy {
        AdmissionPolicy::Unbounded => {
            outstanding.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        AdmissionPolicy::Reject => Some(Instant::now()),
        AdmissionPolicy::BlockFor(wait) => Some(Instant::now() + wait),
        AdmissionPolicy::Block => None,
    };

    loop {
        if try_reserve(outstanding, limit) {
            return Ok(());
        }
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(PoolError::AdmissionTimeout {
                outstanding: outstanding.load(Ordering::SeqCst),
                limit,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn try_reserve(outstanding: &AtomicUsize, limit: usize) -> bool {
    outstanding
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            (n < limit).then_some(n + 1)
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn reject_fails_at_once_when_full() {
        let outstanding = AtomicUsize::new(0);
        reserve(AdmissionPolicy::Reject, 1, &outstanding).await.unwrap();

        let started = Instant::now();
        let err = reserve(AdmissionPolicy::Reject, 1, &outstanding)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::AdmissionTimeout {
                outstanding: 1,
                limit: 1
            }
        ));
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(outstanding.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unbounded_always_admits() {
        let outstanding = AtomicUsize::new(0);
        for _ in 0..100 {
            reserve(AdmissionPolicy::Unbounded, 0, &outstanding)
                .await
                .unwrap();
        }
        assert_eq!(outstanding.load(Ordering::SeqCst), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn block_for_times_out() {
        let outstanding = AtomicUsize::new(2);
        let err = reserve(
            AdmissionPolicy::BlockFor(Duration::from_secs(1)),
            2,
            &outstanding,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PoolError::AdmissionTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn block_waits_for_capacity() {
        let outstanding = Arc::new(AtomicUsize::new(1));
        let releaser = tokio::spawn({
            let outstanding = Arc::clone(&outstanding);
            async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                outstanding.fetch_sub(1, Ordering::SeqCst);
            }
        });

        reserve(AdmissionPolicy::Block, 1, &outstanding).await.unwrap();
        assert_eq!(outstanding.load(Ordering::SeqCst), 1);
        releaser.await.unwrap();
    }
}
