use std::collections::HashMap;
use std::sync::Arc;

use arsenal_core::{TaskKind, TaskPayload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, SchedulerError};
use crate::scheduler::Scheduler;

/// Polymorphic unit implementing execution and failure handling for one
/// task kind.
///
/// Implementations must be `Send + Sync`; a single handler instance serves
/// every task of its kind for the process lifetime.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Stable identifier — the registry maps this kind to `self`.
    fn kind(&self) -> TaskKind;

    /// Whether tasks of this kind bypass the store and live only in memory.
    fn is_runtime_only(&self) -> bool {
        false
    }

    /// Perform the side effect.
    ///
    /// Receives the scheduler handle so a handler can enqueue follow-up
    /// tasks (the countdown refresher re-adds itself this way).
    async fn execute(&self, scheduler: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()>;

    /// Invoked when [`execute`](Self::execute) fails.
    ///
    /// Implementations should report the failure somewhere visible (guild
    /// log channel) and swallow secondary errors. Returning `Err` is the
    /// fatal path: the tick logs it at the loop boundary; the task is
    /// removed either way.
    async fn on_failure(
        &self,
        scheduler: &Scheduler,
        error: &anyhow::Error,
        payload: &TaskPayload,
    ) -> anyhow::Result<()>;

    /// Human-readable description written to the store's `description`
    /// column for operational auditing.
    fn describe(&self, payload: &TaskPayload, time: DateTime<Utc>) -> String {
        let _ = payload;
        format!("{} at {}", self.kind(), arsenal_core::types::format_ts(time))
    }
}

/// Fixed kind → handler mapping, assembled explicitly at process start.
pub struct HandlerRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Build the registry from the full handler list.
    ///
    /// Two handlers claiming the same kind is a wiring bug and fails
    /// construction.
    pub fn new(handlers: Vec<Arc<dyn TaskHandler>>) -> Result<Self> {
        let mut map: HashMap<TaskKind, Arc<dyn TaskHandler>> = HashMap::new();
        for handler in handlers {
            let kind = handler.kind();
            if map.insert(kind, handler).is_some() {
                return Err(SchedulerError::DuplicateHandler { kind });
            }
        }
        Ok(Self { handlers: map })
    }

    /// Resolve a kind to its handler.
    pub fn get(&self, kind: TaskKind) -> Result<&Arc<dyn TaskHandler>> {
        self.handlers
            .get(&kind)
            .ok_or(SchedulerError::UnregisteredKind { kind })
    }

    /// Whether tasks of `kind` belong in the runtime queue.
    pub fn is_runtime_only(&self, kind: TaskKind) -> Result<bool> {
        Ok(self.get(kind)?.is_runtime_only())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(TaskKind);

    #[async_trait]
    impl TaskHandler for Noop {
        fn kind(&self) -> TaskKind {
            self.0
        }
        async fn execute(&self, _: &Scheduler, _: &TaskPayload) -> anyhow::Result<()> {
            Ok(())
        }
        async fn on_failure(
            &self,
            _: &Scheduler,
            _: &anyhow::Error,
            _: &TaskPayload,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_kind_fails_construction() {
        let err = HandlerRegistry::new(vec![
            Arc::new(Noop(TaskKind::FinalizeEvent)),
            Arc::new(Noop(TaskKind::FinalizeEvent)),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::DuplicateHandler {
                kind: TaskKind::FinalizeEvent
            }
        ));
    }

    #[test]
    fn unregistered_kind_is_an_error() {
        let registry = HandlerRegistry::new(vec![Arc::new(Noop(TaskKind::FinalizeEvent))]).unwrap();
        assert!(registry.get(TaskKind::FinalizeEvent).is_ok());
        assert!(matches!(
            registry.get(TaskKind::UpdateStatusPost),
            Err(SchedulerError::UnregisteredKind { .. })
        ));
    }
}
