use std::sync::Arc;

use arsenal_core::{ChatClient, TaskKind, TaskPayload};
use arsenal_scheduler::{Scheduler, TaskHandler};
use arsenal_store::{Cond, Row, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::types::EVENTS_TABLE;

use super::{load_event, report_failure};

/// Fires at the event's start time: flags the run finished and announces
/// the wrap-up to the guild log.
pub struct FinalizeEventHandler {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
}

impl FinalizeEventHandler {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>) -> Self {
        Self { store, chat }
    }
}

#[async_trait]
impl TaskHandler for FinalizeEventHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::FinalizeEvent
    }

    async fn execute(&self, _: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()> {
        let Some(r) = crate::types::EventRef::from_payload(payload) else {
            anyhow::bail!("finalize task with malformed payload");
        };
        let Some(event) = load_event(self.store.as_ref(), r.guild_id, r.event_id).await? else {
            warn!(r.guild_id, r.event_id, "finalize fired for unknown event — skipping");
            return Ok(());
        };
        if event.canceled {
            info!(r.guild_id, r.event_id, "finalize fired for canceled event — skipping");
            return Ok(());
        }

        let mut patch = Row::new();
        patch.insert("finished".into(), 1.into());
        self.store
            .update(
                EVENTS_TABLE,
                &patch,
                &[
                    Cond::new("guild_id", r.guild_id as i64),
                    Cond::new("event_id", r.event_id as i64),
                ],
            )
            .await?;

        self.chat
            .send_guild_log(
                r.guild_id,
                &format!("Run **{}** has started — schedule wrapped up.", event.description),
            )
            .await?;
        info!(r.guild_id, r.event_id, "event finalized");
        Ok(())
    }

    async fn on_failure(
        &self,
        _: &Scheduler,
        error: &anyhow::Error,
        payload: &TaskPayload,
    ) -> anyhow::Result<()> {
        report_failure(self.chat.as_ref(), self.kind(), error, payload).await
    }

    fn describe(&self, payload: &TaskPayload, time: DateTime<Utc>) -> String {
        match crate::types::EventRef::from_payload(payload) {
            Some(r) => format!(
                "Finalize event {} of guild {} at {}",
                r.event_id,
                r.guild_id,
                arsenal_core::types::format_ts(time)
            ),
            None => format!("Finalize event at {}", arsenal_core::types::format_ts(time)),
        }
    }
}
