use std::sync::Arc;

use arsenal_core::{ChatClient, TaskKind, TaskPayload};
use arsenal_scheduler::{Scheduler, TaskHandler};
use arsenal_store::Store;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::Event;

use super::{load_event, report_failure};

/// Resolve the event behind a passcode task, or `None` when the reveal
/// should silently not happen (event gone, canceled, or passcodes turned
/// off since scheduling).
async fn reveal_target(
    store: &dyn Store,
    kind: TaskKind,
    payload: &TaskPayload,
) -> anyhow::Result<Option<Event>> {
    let Some(r) = crate::types::EventRef::from_payload(payload) else {
        anyhow::bail!("{kind} task with malformed payload");
    };
    let Some(event) = load_event(store, r.guild_id, r.event_id).await? else {
        warn!(r.guild_id, r.event_id, %kind, "passcode task fired for unknown event — skipping");
        return Ok(None);
    };
    if !event.is_active() || !event.passcodes_enabled() {
        info!(r.guild_id, r.event_id, %kind, "passcode reveal no longer applicable — skipping");
        return Ok(None);
    }
    Ok(Some(event))
}

async fn dm_each(chat: &dyn ChatClient, users: &[u64], text: &str) -> anyhow::Result<()> {
    for &user_id in users {
        chat.send_dm(user_id, text).await?;
    }
    Ok(())
}

/// Sends the main-party passcode to the raid leaders shortly before start.
pub struct RevealMainPasscodeHandler {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
}

impl RevealMainPasscodeHandler {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>) -> Self {
        Self { store, chat }
    }
}

#[async_trait]
impl TaskHandler for RevealMainPasscodeHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::RevealMainPasscode
    }

    async fn execute(&self, _: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()> {
        let Some(event) = reveal_target(self.store.as_ref(), self.kind(), payload).await? else {
            return Ok(());
        };
        let text = format!(
            "Main passcode for **{}**: `{}`",
            event.description, event.passcode_main
        );
        dm_each(self.chat.as_ref(), &event.raid_leaders, &text).await?;
        info!(
            event.guild_id,
            event.event_id,
            leaders = event.raid_leaders.len(),
            "main passcode revealed"
        );
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

/// Sends each party leader the passcode well ahead of the run, so parties
/// can be briefed before the public reveal.
pub struct NotifyPartyLeadersHandler {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
}

impl NotifyPartyLeadersHandler {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>) -> Self {
        Self { store, chat }
    }
}

#[async_trait]
impl TaskHandler for NotifyPartyLeadersHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::NotifyPartyLeaders
    }

    async fn execute(&self, _: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()> {
        let Some(event) = reveal_target(self.store.as_ref(), self.kind(), payload).await? else {
            return Ok(());
        };
        let text = format!(
            "You are leading a party in **{}** — the passcode is `{}`. Brief your party before start.",
            event.description, event.passcode_main
        );
        dm_each(self.chat.as_ref(), &event.party_leaders, &text).await?;
        info!(
            event.guild_id,
            event.event_id,
            leaders = event.party_leaders.len(),
            "party leaders notified"
        );
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

/// Sends the support-party passcode to the raid leaders. Skips silently
/// when the event dropped its support party after scheduling.
pub struct RevealSupportPasscodeHandler {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
}

impl RevealSupportPasscodeHandler {
    pub fn new(store: Arc<dyn Store>, chat: Arc<dyn ChatClient>) -> Self {
        Self { store, chat }
    }
}

#[async_trait]
impl TaskHandler for RevealSupportPasscodeHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::RevealSupportPasscode
    }

    async fn execute(&self, _: &Scheduler, payload: &TaskPayload) -> anyhow::Result<()> {
        let Some(event) = reveal_target(self.store.as_ref(), self.kind(), payload).await? else {
            return Ok(());
        };
        if !event.use_support {
            info!(event.guild_id, event.event_id, "support disabled since scheduling — skipping");
            return Ok(());
        }
        let text = format!(
            "Support passcode for **{}**: `{}`",
            event.description, event.passcode_support
        );
        dm_each(self.chat.as_ref(), &event.raid_leaders, &text).await?;
        info!(event.guild_id, event.event_id, "support passcode revealed");
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
