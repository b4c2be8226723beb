use thiserror::Error;

/// Errors that can occur in the event domain.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Store error: {0}")]
    Store(#[from] arsenal_store::StoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] arsenal_scheduler::SchedulerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event {event_id} not found in guild {guild_id}")]
    NotFound { guild_id: u64, event_id: u64 },
}

pub type Result<T> = std::result::Result<T, EventError>;
