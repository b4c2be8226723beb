use std::sync::Arc;

use arsenal_core::{TaskKind, TaskPayload};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::signal::CompletionBoard;
use crate::types::{Signature, Task};

/// In-memory queue for runtime-only tasks.
///
/// Nothing here touches the store — contents are lost on restart by
/// design. The list is kept sorted by `(execution_time, seq)`; a stable
/// re-sort after every insert preserves insertion order among tasks that
/// share a due time.
pub struct RuntimeQueue {
    tasks: Vec<Task>,
    next_seq: u64,
    board: Arc<CompletionBoard>,
}

impl RuntimeQueue {
    pub fn new(board: Arc<CompletionBoard>) -> Self {
        Self {
            tasks: Vec::new(),
            next_seq: 0,
            board,
        }
    }

    /// Queue a task. Assigns the signature and insertion sequence.
    pub fn add(&mut self, time: DateTime<Utc>, kind: TaskKind, payload: TaskPayload) -> Task {
        let task = Task {
            id: None,
            signature: Uuid::new_v4(),
            execution_time: time,
            kind,
            payload,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.tasks.push(task.clone());
        self.tasks
            .sort_by_key(|t| (t.execution_time, t.seq));
        task
    }

    /// First task if it is already due, else `None`.
    pub fn due_head(&self, now: DateTime<Utc>) -> Option<&Task> {
        self.tasks.first().filter(|t| t.is_due(now))
    }

    /// Remove one task by signature. Returns it when it was queued.
    pub fn remove_signature(&mut self, signature: Signature) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.signature == signature)?;
        let task = self.tasks.remove(pos);
        self.board.notify(signature);
        Some(task)
    }

    /// Remove every task of `kind`. Returns how many were dropped.
    pub fn remove_all(&mut self, kind: TaskKind) -> u64 {
        self.drain_matching(|t| t.kind == kind)
    }

    /// Remove every task of `kind` whose payload is structurally equal to
    /// `payload` (exact match, not partial).
    pub fn remove_by_data(&mut self, kind: TaskKind, payload: &TaskPayload) -> u64 {
        self.drain_matching(|t| t.kind == kind && &t.payload == payload)
    }

    pub fn contains(&self, signature: Signature) -> bool {
        self.tasks.iter().any(|t| t.signature == signature)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn drain_matching(&mut self, pred: impl Fn(&Task) -> bool) -> u64 {
        let mut removed = 0u64;
        let mut kept = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.drain(..) {
            if pred(&task) {
                self.board.notify(task.signature);
                removed += 1;
            } else {
                kept.push(task);
            }
        }
        self.tasks = kept;
        removed
    }
}
