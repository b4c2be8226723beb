use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arsenal_core::config::SchedulerConfig;
use arsenal_core::{TaskKind, TaskPayload};
use arsenal_store::Store;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::handler::HandlerRegistry;
use crate::persistent::PersistentQueue;
use crate::runtime::RuntimeQueue;
use crate::signal::CompletionBoard;
use crate::types::{Signature, Task};

struct Queues {
    persistent: PersistentQueue,
    runtime: RuntimeQueue,
}

struct Inner {
    queues: Mutex<Queues>,
    registry: Arc<HandlerRegistry>,
    board: Arc<CompletionBoard>,
    /// Idle/Executing guard — at most one task execution in flight, ever.
    executing: AtomicBool,
    tick_interval: Duration,
}

/// The scheduler: both queues, the registry, and the dispatch loop.
///
/// Cheaply cloneable handle over shared state — construct once at startup
/// and pass clones to whoever needs to queue or cancel work (event bundle
/// manager, command handlers). There is no global instance.
///
/// Tasks are routed to the persistent or runtime queue solely by their
/// kind's [`is_runtime_only`](crate::TaskHandler::is_runtime_only) flag;
/// a task is never in both queues.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<HandlerRegistry>,
        config: &SchedulerConfig,
    ) -> Self {
        let board = Arc::new(CompletionBoard::new());
        let persistent = PersistentQueue::new(
            store,
            Arc::clone(&registry),
            Arc::clone(&board),
            config.store_retry_attempts,
        );
        let runtime = RuntimeQueue::new(Arc::clone(&board));
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(Queues {
                    persistent,
                    runtime,
                }),
                registry,
                board,
                executing: AtomicBool::new(false),
                tick_interval: Duration::from_secs(config.tick_secs.max(1)),
            }),
        }
    }

    /// Populate the persistent mirror from the store. Call once at startup
    /// before [`run`](Self::run).
    pub async fn load(&self) -> Result<()> {
        self.inner.queues.lock().await.persistent.load().await
    }

    /// Queue a task, routed by its kind's handler flag.
    ///
    /// Returns the created task — persistent tasks come back with their
    /// generated store id, so callers have a direct handle without
    /// re-querying.
    pub async fn add(
        &self,
        time: DateTime<Utc>,
        kind: TaskKind,
        payload: TaskPayload,
    ) -> Result<Task> {
        let runtime_only = self.inner.registry.is_runtime_only(kind)?;
        let mut queues = self.inner.queues.lock().await;
        let task = if runtime_only {
            queues.runtime.add(time, kind, payload)
        } else {
            queues.persistent.add(time, kind, payload).await?
        };
        debug!(kind = %kind, signature = %task.signature, time = %time, "task queued");
        Ok(task)
    }

    /// Remove a persistent task by store id.
    pub async fn remove(&self, id: i64) -> Result<()> {
        self.inner.queues.lock().await.persistent.remove(id).await
    }

    /// Remove a runtime task by signature. Returns whether it was queued.
    pub async fn remove_signature(&self, signature: Signature) -> bool {
        self.inner
            .queues
            .lock()
            .await
            .runtime
            .remove_signature(signature)
            .is_some()
    }

    /// Remove every task of `kind` from its queue.
    pub async fn remove_all(&self, kind: TaskKind) -> Result<u64> {
        let runtime_only = self.inner.registry.is_runtime_only(kind)?;
        let mut queues = self.inner.queues.lock().await;
        if runtime_only {
            Ok(queues.runtime.remove_all(kind))
        } else {
            queues.persistent.remove_all(kind).await
        }
    }

    /// Remove every task of `kind` whose payload equals `payload` exactly.
    pub async fn remove_by_data(&self, kind: TaskKind, payload: &TaskPayload) -> Result<u64> {
        let runtime_only = self.inner.registry.is_runtime_only(kind)?;
        let mut queues = self.inner.queues.lock().await;
        if runtime_only {
            Ok(queues.runtime.remove_by_data(kind, payload))
        } else {
            queues.persistent.remove_by_data(kind, payload).await
        }
    }

    /// Suspend until the task with `signature` is no longer in either
    /// queue — it executed or was removed. Returns immediately when it is
    /// already gone.
    pub async fn await_signature(&self, signature: Signature) {
        let rx = {
            // Subscribe while holding the queue lock so a concurrent
            // removal cannot slip between the presence check and the
            // subscription.
            let queues = self.inner.queues.lock().await;
            if !queues.persistent.contains(signature) && !queues.runtime.contains(signature) {
                return;
            }
            self.inner.board.subscribe(signature)
        };
        let _ = rx.await;
    }

    /// Snapshot of every queued task across both queues, for diagnostics
    /// and tests.
    pub async fn tasks(&self) -> Vec<Task> {
        let queues = self.inner.queues.lock().await;
        queues
            .persistent
            .iter()
            .chain(queues.runtime.iter())
            .cloned()
            .collect()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    /// Main dispatch loop. Polls once per tick interval until `shutdown`
    /// broadcasts `true`. Tick errors are logged here — one bad task never
    /// takes the loop down.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler loop started");
        let mut interval = tokio::time::interval(self.inner.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One poll iteration.
    ///
    /// Skips entirely while an execution is in flight; otherwise selects
    /// the earliest due task across both queues (exact tie: the persistent
    /// task wins), executes it, and removes it from its originating queue
    /// whether it succeeded, failed handled, or failed fatally.
    pub async fn tick(&self) -> Result<()> {
        // Claim the guard atomically — a tick arriving while another one is
        // executing (or selecting) backs off without touching the queues.
        if self.inner.executing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let now = Utc::now();
        let selected = {
            let queues = self.inner.queues.lock().await;
            let head_p = queues.persistent.due_head(now);
            let head_r = queues.runtime.due_head(now);
            match (head_p, head_r) {
                (Some(p), Some(r)) if r.execution_time < p.execution_time => Some(r.clone()),
                (Some(p), _) => Some(p.clone()),
                (None, Some(r)) => Some(r.clone()),
                (None, None) => None,
            }
        };
        let Some(task) = selected else {
            self.inner.executing.store(false, Ordering::SeqCst);
            return Ok(());
        };

        let result = self.execute(&task).await;
        let cleanup = self.finish(&task).await;
        self.inner.executing.store(false, Ordering::SeqCst);

        result.and(cleanup)
    }

    /// Run the task's handler, routing failures to `on_failure`.
    async fn execute(&self, task: &Task) -> Result<()> {
        let handler = Arc::clone(self.inner.registry.get(task.kind)?);
        debug!(kind = %task.kind, signature = %task.signature, "executing task");

        match handler.execute(self, &task.payload).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(kind = %task.kind, error = %err, "task execution failed");
                handler
                    .on_failure(self, &err, &task.payload)
                    .await
                    .map_err(|fatal| SchedulerError::HandlerFailed {
                        kind: task.kind,
                        message: fatal.to_string(),
                    })
            }
        }
    }

    /// Remove an executed task from its originating queue and wake any
    /// completion waiters.
    async fn finish(&self, task: &Task) -> Result<()> {
        let mut queues = self.inner.queues.lock().await;
        match task.id {
            Some(id) => queues.persistent.remove(id).await,
            None => {
                queues.runtime.remove_signature(task.signature);
                Ok(())
            }
        }
    }
}
