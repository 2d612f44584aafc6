use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Pool-level errors.
///
/// Task execution failures never show up here; they are absorbed into
/// [`TaskResult`](crate::task::TaskResult) and reported through the task's own callbacks.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),

    /// Admission control could not accept the task within `max_block_sec`.
    #[error("admission timed out: {outstanding} tasks outstanding (limit {limit})")]
    AdmissionTimeout { outstanding: usize, limit: usize },

    /// Bounded close gave up before the pool drained.
    #[error("shutdown timed out: in_flight={in_flight} queued={queued}")]
    ShutdownTimeout { in_flight: i64, queued: usize },

    /// The pool is draining or stopped and no longer accepts tasks.
    #[error("task pool is closed")]
    Closed,

    #[error("illegal pool state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error("failed to decode pool config: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Error returned by [`Task::execute`](crate::task::Task::execute).
///
/// Kept cheap to clone because every recorded [`Attempt`](crate::task::Attempt)
/// holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    message: Arc<str>,
    kind: Option<Arc<str>>,
}

impl TaskError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string().into(),
            kind: None,
        }
    }

    /// Attach a short classification (e.g. `"timeout"`, `"http_503"`).
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into().into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "[{kind}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TaskError {}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
