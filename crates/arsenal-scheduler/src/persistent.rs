use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arsenal_core::types::{format_ts, parse_ts};
use arsenal_core::{TaskKind, TaskPayload};
use arsenal_store::{Cond, Row, Store};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::handler::HandlerRegistry;
use crate::signal::CompletionBoard;
use crate::types::{Signature, Task};

const TASKS_TABLE: &str = "tasks";
const COL_ID: &str = "id";
const COL_EXECUTION_TIME: &str = "execution_time";
const COL_TASK_TYPE: &str = "task_type";
const COL_DATA: &str = "data";
const COL_DESCRIPTION: &str = "description";

/// First retry delay for failed store operations.
const RETRY_BASE_MS: u64 = 100;
/// Delay cap — a transient outage should not stall a mutation for long.
const RETRY_MAX_MS: u64 = 2_000;

/// Durable, store-backed queue of due-in-the-future tasks.
///
/// The in-memory mirror is re-read from the store after every mutation and
/// arrives already ordered by `(execution_time, id)` — there is no
/// independent sort step. Signatures are attached per row id and survive
/// reloads, so a caller holding one can still await or cancel the task
/// after an unrelated mutation rebuilt the mirror.
pub struct PersistentQueue {
    store: Arc<dyn Store>,
    registry: Arc<HandlerRegistry>,
    board: Arc<CompletionBoard>,
    tasks: Vec<Task>,
    signatures: HashMap<i64, Signature>,
    retry_attempts: u32,
}

impl PersistentQueue {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<HandlerRegistry>,
        board: Arc<CompletionBoard>,
        retry_attempts: u32,
    ) -> Self {
        Self {
            store,
            registry,
            board,
            tasks: Vec::new(),
            signatures: HashMap::new(),
            retry_attempts: retry_attempts.max(1),
        }
    }

    /// Clear the mirror and re-read all rows, oldest due time first.
    ///
    /// Rows whose kind is unknown or unregistered are skipped with a
    /// warning — a newer bot version may have written them. Signatures of
    /// rows that disappeared are pruned and their waiters woken.
    pub async fn load(&mut self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let rows = retry(self.retry_attempts, "load tasks", move || {
            let store = Arc::clone(&store);
            async move {
                store
                    .select(TASKS_TABLE, &[], &[], &[COL_EXECUTION_TIME, COL_ID], None)
                    .await
            }
        })
        .await?;

        self.tasks.clear();
        let mut seen = HashSet::new();
        for row in &rows {
            if let Some(task) = self.decode_row(row) {
                seen.insert(task.id.expect("persistent task always has an id"));
                self.tasks.push(task);
            }
        }

        let board = &self.board;
        self.signatures.retain(|id, sig| {
            if seen.contains(id) {
                true
            } else {
                board.notify(*sig);
                false
            }
        });
        Ok(())
    }

    /// Insert a task row and reload the mirror.
    ///
    /// Returns the created task with its generated id and signature, so
    /// callers get a direct handle without re-querying.
    pub async fn add(
        &mut self,
        time: DateTime<Utc>,
        kind: TaskKind,
        payload: TaskPayload,
    ) -> Result<Task> {
        let description = self.registry.get(kind)?.describe(&payload, time);

        let mut record = Row::new();
        record.insert(COL_EXECUTION_TIME.into(), format_ts(time).into());
        record.insert(COL_TASK_TYPE.into(), kind.code().into());
        record.insert(COL_DATA.into(), serde_json::to_string(&payload)?.into());
        record.insert(COL_DESCRIPTION.into(), description.into());

        let store = Arc::clone(&self.store);
        let id = retry(self.retry_attempts, "insert task", move || {
            let store = Arc::clone(&store);
            let record = record.clone();
            async move { store.insert(TASKS_TABLE, &record).await }
        })
        .await?
        .ok_or(SchedulerError::MissingGeneratedId)?;

        let signature = Uuid::new_v4();
        self.signatures.insert(id, signature);
        self.load().await?;

        match self.tasks.iter().find(|t| t.id == Some(id)) {
            Some(task) => Ok(task.clone()),
            // The row exists but failed decoding would have warned above;
            // hand back a handle built from what we inserted.
            None => Ok(Task {
                id: Some(id),
                signature,
                execution_time: time,
                kind,
                payload,
                seq: id as u64,
            }),
        }
    }

    /// Delete one row by id and reload.
    pub async fn remove(&mut self, id: i64) -> Result<()> {
        let store = Arc::clone(&self.store);
        retry(self.retry_attempts, "delete task", move || {
            let store = Arc::clone(&store);
            async move { store.delete(TASKS_TABLE, &[Cond::new(COL_ID, id)]).await }
        })
        .await?;
        self.load().await
    }

    /// Delete all rows of `kind` and reload. Returns how many went away.
    pub async fn remove_all(&mut self, kind: TaskKind) -> Result<u64> {
        let store = Arc::clone(&self.store);
        let deleted = retry(self.retry_attempts, "delete tasks by kind", move || {
            let store = Arc::clone(&store);
            async move {
                store
                    .delete(TASKS_TABLE, &[Cond::new(COL_TASK_TYPE, kind.code())])
                    .await
            }
        })
        .await?;
        self.load().await?;
        Ok(deleted)
    }

    /// Delete rows of `kind` whose stored payload is structurally equal to
    /// `payload` (exact match, not partial), then reload.
    pub async fn remove_by_data(&mut self, kind: TaskKind, payload: &TaskPayload) -> Result<u64> {
        let store = Arc::clone(&self.store);
        let rows = retry(self.retry_attempts, "select tasks by kind", move || {
            let store = Arc::clone(&store);
            async move {
                store
                    .select(
                        TASKS_TABLE,
                        &[COL_ID, COL_DATA],
                        &[Cond::new(COL_TASK_TYPE, kind.code())],
                        &[],
                        None,
                    )
                    .await
            }
        })
        .await?;

        let mut removed = 0u64;
        for row in rows {
            let Some(id) = row.get(COL_ID).and_then(|v| v.as_i64()) else {
                continue;
            };
            let stored: Option<TaskPayload> = row
                .get(COL_DATA)
                .and_then(|v| v.as_str())
                .and_then(|s| serde_json::from_str(s).ok());
            if stored.as_ref() == Some(payload) {
                let store = Arc::clone(&self.store);
                retry(self.retry_attempts, "delete matched task", move || {
                    let store = Arc::clone(&store);
                    async move { store.delete(TASKS_TABLE, &[Cond::new(COL_ID, id)]).await }
                })
                .await?;
                removed += 1;
            }
        }

        self.load().await?;
        Ok(removed)
    }

    /// First task of the mirror if it is already due, else `None`.
    pub fn due_head(&self, now: DateTime<Utc>) -> Option<&Task> {
        self.tasks.first().filter(|t| t.is_due(now))
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

    fn decode_row(&mut self, row: &Row) -> Option<Task> {
        let id = match row.get(COL_ID).and_then(|v| v.as_i64()) {
            Some(id) => id,
            None => {
                warn!("task row without integer id — skipping");
                return None;
            }
        };
        let execution_time = match row
            .get(COL_EXECUTION_TIME)
            .and_then(|v| v.as_str())
            .and_then(parse_ts)
        {
            Some(ts) => ts,
            None => {
                warn!(id, "task row with unparseable execution_time — skipping");
                return None;
            }
        };
        let code = row.get(COL_TASK_TYPE).and_then(|v| v.as_i64()).unwrap_or(-1);
        let kind = match TaskKind::from_code(code) {
            Some(kind) => kind,
            None => {
                warn!(id, code, "task row with unknown kind code — skipping");
                return None;
            }
        };
        if self.registry.get(kind).is_err() {
            warn!(id, kind = %kind, "no handler registered for stored task — skipping");
            return None;
        }
        let payload: TaskPayload = match row
            .get(COL_DATA)
            .and_then(|v| v.as_str())
            .and_then(|s| serde_json::from_str(s).ok())
        {
            Some(p) => p,
            None => {
                warn!(id, "task row with malformed payload — skipping");
                return None;
            }
        };
        let signature = *self.signatures.entry(id).or_insert_with(Uuid::new_v4);
        Some(Task {
            id: Some(id),
            signature,
            execution_time,
            kind,
            payload,
            seq: id as u64,
        })
    }
}

/// Run a store operation with bounded exponential backoff.
///
/// A transient outage must not wedge the caller; exhausted attempts
/// surface the last error.
async fn retry<T, Fut, F>(attempts: u32, op: &'static str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = arsenal_store::Result<T>>,
{
    let mut delay = Duration::from_millis(RETRY_BASE_MS);
    for attempt in 1u32.. {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= attempts => return Err(e.into()),
            Err(e) => {
                warn!(op, attempt, error = %e, "store operation failed, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(RETRY_MAX_MS));
            }
        }
    }
    unreachable!("retry loop always returns from within")
}
