use std::sync::Arc;

use arsenal_core::config::EventsConfig;
use arsenal_scheduler::Scheduler;
use arsenal_store::{Cond, Row, Store};
use tracing::{info, instrument};

use crate::bundle::EventBundleManager;
use crate::error::{EventError, Result};
use crate::types::{Event, EVENTS_TABLE};

/// Persists events and keeps their task bundles consistent.
///
/// Every mutation that can invalidate derived tasks (edit, cancel, finish)
/// goes through here so the bundle teardown/recreation can never be
/// forgotten at a call site.
pub struct EventManager {
    store: Arc<dyn Store>,
    bundle: EventBundleManager,
}

impl EventManager {
    pub fn new(store: Arc<dyn Store>, scheduler: Scheduler, config: EventsConfig) -> Self {
        Self {
            store,
            bundle: EventBundleManager::new(scheduler, config),
        }
    }

    pub fn bundle(&self) -> &EventBundleManager {
        &self.bundle
    }

    /// Persist a new event and queue its bundle.
    #[instrument(skip(self, event), fields(guild_id = event.guild_id, event_id = event.event_id))]
    pub async fn create(&self, event: &Event) -> Result<()> {
        self.store.insert(EVENTS_TABLE, &event.to_row()).await?;
        self.bundle.create_tasks(event).await?;
        info!("event created");
        Ok(())
    }

    /// Apply an edit: replace the stored row and rebuild the bundle.
    ///
    /// The bundle of the *stored* (pre-edit) event is deleted first, so a
    /// changed recruitment channel still matches the queued payloads.
    #[instrument(skip(self, event), fields(guild_id = event.guild_id, event_id = event.event_id))]
    pub async fn edit(&self, event: &Event) -> Result<()> {
        let old = self
            .get(event.guild_id, event.event_id)
            .await?
            .ok_or(EventError::NotFound {
                guild_id: event.guild_id,
                event_id: event.event_id,
            })?;

        self.bundle.delete_tasks(&old).await?;
        self.store
            .update(EVENTS_TABLE, &event.to_row(), &identity(event.guild_id, event.event_id))
            .await?;
        self.bundle.create_tasks(event).await?;
        info!("event edited, bundle recreated");
        Ok(())
    }

    /// Soft-delete: flag the event canceled and tear down its bundle.
    pub async fn cancel(&self, guild_id: u64, event_id: u64) -> Result<Event> {
        self.close(guild_id, event_id, "canceled").await
    }

    /// Flag the event finished and tear down whatever is still queued.
    pub async fn finish(&self, guild_id: u64, event_id: u64) -> Result<Event> {
        self.close(guild_id, event_id, "finished").await
    }

    pub async fn get(&self, guild_id: u64, event_id: u64) -> Result<Option<Event>> {
        let rows = self
            .store
            .select(EVENTS_TABLE, &[], &identity(guild_id, event_id), &[], Some(1))
            .await?;
        Ok(rows.first().and_then(Event::from_row))
    }

    /// All not-yet-closed events of a guild, soonest first.
    pub async fn list_active(&self, guild_id: u64) -> Result<Vec<Event>> {
        let rows = self
            .store
            .select(
                EVENTS_TABLE,
                &[],
                &[
                    Cond::new("guild_id", guild_id as i64),
                    Cond::new("canceled", 0),
                    Cond::new("finished", 0),
                ],
                &["timestamp"],
                None,
            )
            .await?;
        Ok(rows.iter().filter_map(Event::from_row).collect())
    }

    #[instrument(skip(self), fields(guild_id, event_id, flag))]
    async fn close(&self, guild_id: u64, event_id: u64, flag: &'static str) -> Result<Event> {
        let mut event = self
            .get(guild_id, event_id)
            .await?
            .ok_or(EventError::NotFound { guild_id, event_id })?;

        let mut patch = Row::new();
        patch.insert(flag.into(), 1.into());
        self.store
            .update(EVENTS_TABLE, &patch, &identity(guild_id, event_id))
            .await?;

        match flag {
            "canceled" => event.canceled = true,
            _ => event.finished = true,
        }
        self.bundle.delete_tasks(&event).await?;
        info!("event closed, bundle torn down");
        Ok(event)
    }
}

fn identity(guild_id: u64, event_id: u64) -> [Cond; 2] {
    [
        Cond::new("guild_id", guild_id as i64),
        Cond::new("event_id", event_id as i64),
    ]
}
