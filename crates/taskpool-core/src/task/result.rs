//! Attempt history handed to the terminal callback.

use crate::error::TaskError;
use crate::ids::TaskId;

/// One recorded execution outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    succeeded: bool,
    error: Option<TaskError>,
    timestamp_ms: i64,
}

impl Attempt {
    pub fn success(timestamp_ms: i64) -> Self {
        Self {
            succeeded: true,
            error: None,
            timestamp_ms,
        }
    }

    pub fn failure(error: TaskError, timestamp_ms: i64) -> Self {
        Self {
            succeeded: false,
            error: Some(error),
            timestamp_ms,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

/// Outcome of a submitted task.
///
/// `is_successful()` reflects the latest attempt until the terminal callback
/// fires; only then is it final.
#[derive(Debug, Clone)]
pub struct TaskResult {
    task_id: TaskId,
    successful: bool,
    attempts: Vec<Attempt>,
}

impl TaskResult {
    pub(crate) fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            successful: false,
            attempts: Vec::new(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    /// Reserved attempt history, oldest first.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Error of the last recorded attempt.
    pub fn error(&self) -> Option<&TaskError> {
        self.attempts.last().and_then(Attempt::error)
    }

    /// Timestamp of the last recorded attempt, `0` if none was recorded.
    pub fn timestamp_ms(&self) -> i64 {
        self.attempts.last().map_or(0, Attempt::timestamp_ms)
    }

    pub(crate) fn set_successful(&mut self, successful: bool) {
        self.successful = successful;
    }

    pub(crate) fn push_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }
}
