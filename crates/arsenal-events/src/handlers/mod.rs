//! Task handlers for every bundle kind.
//!
//! All handlers load the *current* event row at fire time, so edits made
//! between scheduling and firing are honored, and all of them skip with a
//! warning when the event is gone or no longer active — firing into a
//! canceled run must never leak a passcode.

mod finalize;
mod passcode;
mod recruitment;
mod status;

use std::sync::Arc;

use arsenal_core::config::EventsConfig;
use arsenal_core::types::payload_u64;
use arsenal_core::{ChatClient, TaskKind, TaskPayload};
use arsenal_scheduler::TaskHandler;
use arsenal_store::{Cond, Store};
use tracing::error;

use crate::types::{Event, EVENTS_TABLE};

pub use finalize::FinalizeEventHandler;
pub use passcode::{
    NotifyPartyLeadersHandler, RevealMainPasscodeHandler, RevealSupportPasscodeHandler,
};
pub use recruitment::DeleteRecruitmentPostHandler;
pub use status::UpdateStatusPostHandler;

/// The full handler list for [`arsenal_scheduler::HandlerRegistry::new`] —
/// one entry per task kind, assembled at process start.
pub fn all_handlers(
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
    config: &EventsConfig,
) -> Vec<Arc<dyn TaskHandler>> {
    vec![
        Arc::new(FinalizeEventHandler::new(
            Arc::clone(&store),
            Arc::clone(&chat),
        )),
        Arc::new(RevealMainPasscodeHandler::new(
            Arc::clone(&store),
            Arc::clone(&chat),
        )),
        Arc::new(NotifyPartyLeadersHandler::new(
            Arc::clone(&store),
            Arc::clone(&chat),
        )),
        Arc::new(RevealSupportPasscodeHandler::new(
            Arc::clone(&store),
            Arc::clone(&chat),
        )),
        Arc::new(DeleteRecruitmentPostHandler::new(
            Arc::clone(&store),
            Arc::clone(&chat),
        )),
        Arc::new(UpdateStatusPostHandler::new(
            store,
            chat,
            config.status_refresh_secs,
        )),
    ]
}

/// Shared `on_failure` body: report to the guild's log channel when the
/// payload identifies one, otherwise escalate as fatal.
///
/// A failing log delivery is swallowed — the failure hook itself must not
/// fail for that.
pub(crate) async fn report_failure(
    chat: &dyn ChatClient,
    kind: TaskKind,
    error: &anyhow::Error,
    payload: &TaskPayload,
) -> anyhow::Result<()> {
    match payload_u64(payload, "guild_id") {
        Some(guild_id) => {
            let text = format!("Scheduled task `{kind}` failed: {error}");
            if let Err(log_err) = chat.send_guild_log(guild_id, &text).await {
                error!(guild_id, %log_err, "could not report task failure to guild log");
            }
            Ok(())
        }
        None => Err(anyhow::anyhow!("task {kind} failed without guild context: {error}")),
    }
}

/// Load one event by identity through the store contract.
pub(crate) async fn load_event(
    store: &dyn Store,
    guild_id: u64,
    event_id: u64,
) -> anyhow::Result<Option<Event>> {
    let rows = store
        .select(
            EVENTS_TABLE,
            &[],
            &[
                Cond::new("guild_id", guild_id as i64),
                Cond::new("event_id", event_id as i64),
            ],
            &[],
            Some(1),
        )
        .await?;
    Ok(rows.first().and_then(Event::from_row))
}
