use arsenal_core::TaskKind;
use thiserror::Error;

/// Errors that can occur within the scheduling subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying store error, after retries were exhausted.
    #[error("Store error: {0}")]
    Store(#[from] arsenal_store::StoreError),

    /// A task payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No handler is registered for the kind.
    #[error("No handler registered for task kind {kind}")]
    UnregisteredKind { kind: TaskKind },

    /// Two handlers claim the same kind at registry construction.
    #[error("Duplicate handler for task kind {kind}")]
    DuplicateHandler { kind: TaskKind },

    /// The store did not return a generated id for an inserted task.
    #[error("Store returned no generated id for inserted task")]
    MissingGeneratedId,

    /// A handler's failure hook itself failed — fatal for the tick.
    #[error("Handler for {kind} failed fatally: {message}")]
    HandlerFailed { kind: TaskKind, message: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
