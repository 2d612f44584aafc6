//! Task identifiers.
//!
//! ULID ベースの ID: 生成順にソート可能なので、ログを ID で並べると投入順になる。

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::Clock;

/// Identifier assigned to every submitted task.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// IdGenerator は TaskId を生成
///
/// The timestamp part comes from the supplied clock so ids stay consistent with
/// the pool's notion of time.
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now_ms().max(0) as u64;
        TaskId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn display_has_task_prefix() {
        let id = TaskId::from_ulid(Ulid::new());
        assert!(id.to_string().starts_with("task-"));
    }

    #[test]
    fn generated_ids_follow_the_clock() {
        let clock = ManualClock::new(1_000);
        let ids = UlidGenerator::new(clock.clone());

        let first = ids.generate_task_id();
        clock.advance_ms(10);
        let second = ids.generate_task_id();

        assert_eq!(first.as_ulid().timestamp_ms(), 1_000);
        assert_eq!(second.as_ulid().timestamp_ms(), 1_010);
        assert!(first < second);
    }

    #[test]
    fn ids_can_be_serialized() {
        let id = TaskId::from_ulid(Ulid::new());
        let s = serde_json::to_string(&id).unwrap();
        let back: TaskId = serde_json::from_str(&s).unwrap();
        assert_eq!(id, back);
    }
}
