//! Pool lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State transitions:
/// - Created -> Running (`start`)
/// - Created | Running -> Draining (`safe_close` / `close`)
/// - Draining -> Stopped (drain finished)
///
/// A bounded close that times out leaves the pool in Draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Created,
    Running,
    Draining,
    Stopped,
}

impl PoolState {
    /// Does `push_task` accept work in this state?
    pub fn accepts_tasks(self) -> bool {
        matches!(self, PoolState::Created | PoolState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Draining => "draining",
            PoolState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
