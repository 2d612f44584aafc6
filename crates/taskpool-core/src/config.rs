//! Pool configuration.
//!
//! Plain value holder, frozen when the pool is built. Every field has a default
//! so a JSON file only needs to mention what it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// How many attempts are remembered in a task's result history.
    pub max_reserved_attempts: u32,

    /// How many times a failing task is retried before giving up.
    pub max_retry_times: u32,

    /// Backoff before the first retry.
    pub base_retry_backoff_ms: i64,

    /// Upper bound for any single backoff.
    pub max_retry_backoff_ms: i64,

    /// Concurrency ceiling for task executions.
    pub max_io_worker_num: usize,

    /// Admission ceiling on outstanding tasks. `0` disables admission control.
    pub max_task_num: usize,

    /// Admission blocking policy (see [`AdmissionPolicy`]).
    pub max_block_sec: i64,

    /// Idle interval of the retry scan when nothing has matured.
    pub linger_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_reserved_attempts: 11,
            max_retry_times: 10,
            base_retry_backoff_ms: 100,
            max_retry_backoff_ms: 50 * 1000,
            max_io_worker_num: 50,
            max_task_num: 1000,
            max_block_sec: 60,
            linger_ms: 100,
        }
    }
}

/// What `push_task` does when the pool is at `max_task_num`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// No ceiling configured.
    Unbounded,
    /// Fail at once.
    Reject,
    /// Wait up to the given duration, then fail.
    BlockFor(Duration),
    /// Wait as long as it takes.
    Block,
}

impl PoolConfig {
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        let config: PoolConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the pool cannot be built from.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_io_worker_num == 0 {
            return Err(PoolError::InvalidConfig(
                "max_io_worker_num must be at least 1".to_string(),
            ));
        }
        if self.base_retry_backoff_ms < 0 || self.max_retry_backoff_ms < 0 {
            return Err(PoolError::InvalidConfig(
                "retry backoff must not be negative".to_string(),
            ));
        }
        if self.base_retry_backoff_ms > self.max_retry_backoff_ms {
            return Err(PoolError::InvalidConfig(format!(
                "base_retry_backoff_ms ({}) exceeds max_retry_backoff_ms ({})",
                self.base_retry_backoff_ms, self.max_retry_backoff_ms
            )));
        }
        Ok(())
    }

    /// Map `max_task_num` / `max_block_sec` onto an admission policy.
    ///
    /// - `max_block_sec > 0`: block up to that many seconds
    /// - `max_block_sec == 0`: reject immediately
    /// - `max_block_sec < 0`: block indefinitely
    pub fn admission(&self) -> AdmissionPolicy {
        if self.max_task_num == 0 {
            return AdmissionPolicy::Unbounded;
        }
        match self.max_block_sec {
            0 => AdmissionPolicy::Reject,
            secs if secs > 0 => AdmissionPolicy::BlockFor(Duration::from_secs(secs as u64)),
            _ => AdmissionPolicy::Block,
        }
    }

    /// Retry scan idle interval, at least 1ms.
    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_config_matches_documented_values() {
        let c = PoolConfig::default();
        assert_eq!(c.max_reserved_attempts, 11);
        assert_eq!(c.max_retry_times, 10);
        assert_eq!(c.base_retry_backoff_ms, 100);
        assert_eq!(c.max_retry_backoff_ms, 50_000);
        assert_eq!(c.max_io_worker_num, 50);
        assert_eq!(c.max_task_num, 1000);
        assert_eq!(c.max_block_sec, 60);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "max_retry_times": 3, "max_io_worker_num": 4 }"#;
        let c = PoolConfig::from_json(json).unwrap();
        assert_eq!(c.max_retry_times, 3);
        assert_eq!(c.max_io_worker_num, 4);
        assert_eq!(c.base_retry_backoff_ms, 100);
        assert_eq!(c.linger_ms, 100);
    }

    #[test]
    fn from_json_rejects_invalid_config() {
        let json = r#"{ "max_io_worker_num": 0 }"#;
        assert!(matches!(
            PoolConfig::from_json(json),
            Err(PoolError::InvalidConfig(_))
        ));

        assert!(matches!(
            PoolConfig::from_json("not json"),
            Err(PoolError::Decode(_))
        ));
    }

    #[rstest]
    #[case(100, 50)]
    #[case(-1, 10)]
    fn invalid_backoff_bounds(#[case] base: i64, #[case] max: i64) {
        let c = PoolConfig {
            base_retry_backoff_ms: base,
            max_retry_backoff_ms: max,
            ..PoolConfig::default()
        };
        assert!(matches!(c.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[rstest]
    #[case(1000, 5, AdmissionPolicy::BlockFor(Duration::from_secs(5)))]
    #[case(1000, 0, AdmissionPolicy::Reject)]
    #[case(1000, -1, AdmissionPolicy::Block)]
    #[case(0, 5, AdmissionPolicy::Unbounded)]
    fn admission_policy_from_config(
        #[case] max_task_num: usize,
        #[case] max_block_sec: i64,
        #[case] expected: AdmissionPolicy,
    ) {
        let c = PoolConfig {
            max_task_num,
            max_block_sec,
            ..PoolConfig::default()
        };
        assert_eq!(c.admission(), expected);
    }
}
