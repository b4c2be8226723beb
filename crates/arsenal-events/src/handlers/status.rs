use std::sync::Arc;

use arsenal_core::{ChatClient, TaskKind, TaskPayload};
use arsenal_scheduler::{Scheduler, TaskHandler};
use arsenal_store::Store;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::types::StatusPostRef;

use super::{load_event, report_failure};

/// Runtime-only countdown refresher for the recruitment post.
///
/// Edits the post with the time remaining and re-queues itself one refresh
/// interval ahead. Stops on its own when the event is gone, closed, or has
/// started — a restart simply stops the countdown until the post is
/// recreated, which is why this kind never touches the store queue.
pub struct UpdateStatusPostHandler {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
    refresh_secs: i64,
}

impl UpdateStatusPostHandler {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>, refresh_secs: i64) -> Self {
        Self {
            store,
            chat,
            refresh_secs: refresh_secs.max(1),
        }
    }
}

#[async_trait]
impl TaskHandler for UpdateStatusPostHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::UpdateStatusPost
    }

    fn is_runtime_only(&self) -> bool {
        true
    }

    async fn execute(&self, scheduler: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()> {
        let Some(r) = StatusPostRef::from_payload(payload) else {
            anyhow::bail!("status refresh task with malformed payload");
        };
        let Some(event) = load_event(self.store.as_ref(), r.guild_id, r.event_id).await? else {
            debug!(r.guild_id, r.event_id, "event gone — stopping countdown");
            return Ok(());
        };
        if !event.is_active() {
            debug!(r.guild_id, r.event_id, "event closed — stopping countdown");
            return Ok(());
        }

        let now = Utc::now();
        if now >= event.timestamp {
            self.chat
                .edit_message(
                    r.channel_id,
                    r.message_id,
                    &format!("**{}** — the run has started!", event.description),
                )
                .await?;
            info!(r.guild_id, r.event_id, "countdown finished");
            return Ok(());
        }

        let remaining = event.timestamp - now;
        let text = format!(
            "**{}** — starts in {} (at {}).",
            event.description,
            human_duration(remaining),
            event.timestamp.format("%H:%M UTC")
        );
        self.chat
            .edit_message(r.channel_id, r.message_id, &text)
            .await?;

        // Keep the countdown alive until start.
        scheduler
            .add(
                now + Duration::seconds(self.refresh_secs),
                TaskKind::UpdateStatusPost,
                payload.clone(),
            )
            .await?;
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
}

fn human_duration(d: Duration) -> String {
    let mins = d.num_minutes();
    if mins >= 120 {
        format!("{} h {} min", mins / 60, mins % 60)
    } else if mins >= 1 {
        format!("{mins} min")
    } else {
        "less than a minute".to_string()
    }
}
