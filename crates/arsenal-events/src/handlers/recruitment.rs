use std::sync::Arc;

use arsenal_core::{ChatClient, TaskKind, TaskPayload};
use arsenal_scheduler::{Scheduler, TaskHandler};
use arsenal_store::{Cond, Row, Store};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::{RecruitmentRef, EVENTS_TABLE};

use super::{load_event, report_failure};

/// Deletes the temporary recruitment post a grace period after the run
/// started, and clears the reference on the event row.
pub struct DeleteRecruitmentPostHandler {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
}

impl DeleteRecruitmentPostHandler {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>) -> Self {
        Self { store, chat }
    }
}

#[async_trait]
impl TaskHandler for DeleteRecruitmentPostHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::DeleteRecruitmentPost
    }

    async fn execute(&self, _: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()> {
        let Some(r) = RecruitmentRef::from_payload(payload) else {
            anyhow::bail!("recruitment cleanup task with malformed payload");
        };
        let Some(event) = load_event(self.store.as_ref(), r.guild_id, r.event_id).await? else {
            warn!(r.guild_id, r.event_id, "cleanup fired for unknown event — skipping");
            return Ok(());
        };
        let Some(message_id) = event.recruitment_post_id else {
            // Already cleaned up by hand or by an earlier run of this task.
            info!(r.guild_id, r.event_id, "no recruitment post to delete");
            return Ok(());
        };

        self.chat.delete_message(r.channel_id, message_id).await?;

        let mut patch = Row::new();
        patch.insert("recruitment_post_id".into(), serde_json::Value::Null);
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

        info!(r.guild_id, r.event_id, message_id, "recruitment post deleted");
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
