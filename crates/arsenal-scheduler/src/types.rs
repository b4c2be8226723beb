use arsenal_core::{TaskKind, TaskPayload};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Opaque correlation handle assigned to every task at creation.
///
/// Used for cancellation and for callers that need to detect completion
/// via [`crate::Scheduler::await_signature`]. For persistent tasks the
/// signature stays stable across queue reloads.
pub type Signature = Uuid;

/// A unit of deferred work.
///
/// Tasks are immutable once queued — "editing" one is remove + re-add.
/// Whether a task is runtime-only is not stored here; it is a property of
/// the handler its kind resolves to.
#[derive(Debug, Clone)]
pub struct Task {
    /// Store-assigned row id. `None` for runtime tasks.
    pub id: Option<i64>,
    pub signature: Signature,
    /// Absolute UTC instant at which the task becomes eligible to run.
    pub execution_time: DateTime<Utc>,
    pub kind: TaskKind,
    pub payload: TaskPayload,
    /// Per-queue insertion sequence — deterministic ordering for tasks
    /// sharing an execution time (row id for persistent tasks).
    pub(crate) seq: u64,
}

impl Task {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.execution_time <= now
    }
}
