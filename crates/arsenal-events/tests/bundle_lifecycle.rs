// Event lifecycle against a real scheduler and in-memory store: bundle
// creation, idempotent replacement, edits, selective removal, and the
// handlers' end-to-end side effects through a mock chat client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arsenal_core::config::{EventsConfig, SchedulerConfig};
use arsenal_core::{ChatClient, ChatError, TaskKind};
use arsenal_events::handlers::all_handlers;
use arsenal_events::types::{Event, EventRef, StatusPostRef};
use arsenal_events::EventManager;
use arsenal_scheduler::{HandlerRegistry, Scheduler};
use arsenal_store::{SqliteStore, Store};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};

#[derive(Default)]
struct MockChat {
    dms: Mutex<Vec<(u64, String)>>,
    logs: Mutex<Vec<(u64, String)>>,
    edits: Mutex<Vec<(u64, u64, String)>>,
    deleted: Mutex<Vec<(u64, u64)>>,
    next_message_id: AtomicU64,
    fail_dms: bool,
}

impl MockChat {
    fn failing_dms() -> Self {
        Self {
            fail_dms: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn send_message(&self, channel_id: u64, _text: &str) -> Result<u64, ChatError> {
        let _ = channel_id;
        Ok(1000 + self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        text: &str,
    ) -> Result<(), ChatError> {
        self.edits
            .lock()
            .unwrap()
            .push((channel_id, message_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), ChatError> {
        self.deleted.lock().unwrap().push((channel_id, message_id));
        Ok(())
    }

    async fn send_dm(&self, user_id: u64, text: &str) -> Result<(), ChatError> {
        if self.fail_dms {
            return Err(ChatError::DirectMessage {
                user_id,
                reason: "user blocks DMs".into(),
            });
        }
        self.dms.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }

    async fn send_guild_log(&self, guild_id: u64, text: &str) -> Result<(), ChatError> {
        self.logs.lock().unwrap().push((guild_id, text.to_string()));
        Ok(())
    }
}

struct Fixture {
    chat: Arc<MockChat>,
    scheduler: Scheduler,
    manager: EventManager,
}

fn fixture_with(chat: MockChat) -> Fixture {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let chat = Arc::new(chat);
    let config = EventsConfig::default();

    let handlers = all_handlers(
        Arc::clone(&store),
        Arc::clone(&chat) as Arc<dyn ChatClient>,
        &config,
    );
    let registry = Arc::new(HandlerRegistry::new(handlers).unwrap());
    let scheduler = Scheduler::new(Arc::clone(&store), registry, &SchedulerConfig::default());
    let manager = EventManager::new(store, scheduler.clone(), config);

    Fixture {
        chat,
        scheduler,
        manager,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockChat::default())
}

/// Whole-second UTC instant `mins` minutes from now (negative = past) —
/// whole seconds so values survive the storage round trip unchanged.
fn in_minutes(mins: i64) -> DateTime<Utc> {
    (Utc::now() + Duration::minutes(mins)).with_nanosecond(0).unwrap()
}

fn event(guild_id: u64, event_id: u64, timestamp: DateTime<Utc>) -> Event {
    Event {
        guild_id,
        event_id,
        timestamp,
        event_type: "ba".into(),
        description: format!("run #{event_id}"),
        use_support: false,
        auto_passcode: true,
        passcode_main: "4711".into(),
        passcode_support: String::new(),
        raid_leaders: vec![11],
        party_leaders: vec![21, 22],
        recruitment_channel_id: None,
        recruitment_post_id: None,
        canceled: false,
        finished: false,
    }
}

#[tokio::test]
async fn create_then_delete_leaves_no_tasks_for_the_event() {
    let fx = fixture();
    let ev = event(1, 7, in_minutes(120));

    fx.manager.create(&ev).await.unwrap();
    assert_eq!(fx.scheduler.tasks().await.len(), 3);

    fx.manager.bundle().delete_tasks(&ev).await.unwrap();
    let ident = EventRef::for_event(&ev);
    let leftovers: Vec<_> = fx
        .scheduler
        .tasks()
        .await
        .into_iter()
        .filter(|t| EventRef::from_payload(&t.payload) == Some(ident.clone()))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn recreate_is_idempotent() {
    let fx = fixture();
    let ev = event(1, 7, in_minutes(120));

    fx.manager.create(&ev).await.unwrap();
    fx.manager.bundle().recreate_tasks(&ev).await.unwrap();
    fx.manager.bundle().recreate_tasks(&ev).await.unwrap();

    // Still exactly one bundle, never accumulated duplicates.
    assert_eq!(fx.scheduler.tasks().await.len(), 3);
}

#[tokio::test]
async fn edit_moves_every_task_to_the_new_timestamp() {
    let fx = fixture();
    let t = in_minutes(120);
    let ev = event(1, 7, t);
    fx.manager.create(&ev).await.unwrap();

    let t2 = t + Duration::hours(2);
    let mut moved = ev.clone();
    moved.timestamp = t2;
    fx.manager.edit(&moved).await.unwrap();

    let mut times: Vec<_> = fx
        .scheduler
        .tasks()
        .await
        .iter()
        .map(|task| task.execution_time)
        .collect();
    times.sort();
    assert_eq!(
        times,
        vec![t2 - Duration::minutes(45), t2 - Duration::minutes(15), t2]
    );
}

#[tokio::test]
async fn selective_removal_spares_the_other_event() {
    let fx = fixture();
    fx.manager.create(&event(1, 7, in_minutes(120))).await.unwrap();
    fx.manager.create(&event(1, 8, in_minutes(180))).await.unwrap();

    let removed = fx
        .scheduler
        .remove_by_data(
            TaskKind::NotifyPartyLeaders,
            &EventRef {
                guild_id: 1,
                event_id: 7,
            }
            .to_payload(),
        )
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let tasks = fx.scheduler.tasks().await;
    assert_eq!(tasks.len(), 5);
    let notify_refs: Vec<_> = tasks
        .iter()
        .filter(|t| t.kind == TaskKind::NotifyPartyLeaders)
        .filter_map(|t| EventRef::from_payload(&t.payload))
        .collect();
    assert_eq!(
        notify_refs,
        vec![EventRef {
            guild_id: 1,
            event_id: 8
        }]
    );
}

#[tokio::test]
async fn cancel_flags_the_event_and_tears_down_the_bundle() {
    let fx = fixture();
    fx.manager.create(&event(1, 7, in_minutes(120))).await.unwrap();

    let canceled = fx.manager.cancel(1, 7).await.unwrap();
    assert!(canceled.canceled);
    assert!(fx.scheduler.tasks().await.is_empty());

    // Soft delete: the row is still there.
    let stored = fx.manager.get(1, 7).await.unwrap().unwrap();
    assert!(stored.canceled);
    assert!(fx.manager.list_active(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn due_bundle_executes_end_to_end() {
    let fx = fixture();
    // Start time just passed: every bundle task is already due.
    fx.manager.create(&event(1, 7, in_minutes(-1))).await.unwrap();

    // notify-leaders (T-45), reveal-main (T-15), finalize (T), in that order.
    for _ in 0..3 {
        fx.scheduler.tick().await.unwrap();
    }

    let dms = fx.chat.dms.lock().unwrap().clone();
    let dm_users: Vec<u64> = dms.iter().map(|(user, _)| *user).collect();
    assert_eq!(dm_users, vec![21, 22, 11]);
    assert!(dms.iter().all(|(_, text)| text.contains("4711")));

    let logs = fx.chat.logs.lock().unwrap().clone();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].1.contains("has started"));

    assert!(fx.manager.get(1, 7).await.unwrap().unwrap().finished);
    assert!(fx.scheduler.tasks().await.is_empty());
}

#[tokio::test]
async fn reveal_skips_event_canceled_after_scheduling() {
    let fx = fixture();
    let ev = event(1, 7, in_minutes(120));
    fx.manager.create(&ev).await.unwrap();
    fx.manager.cancel(1, 7).await.unwrap();

    // A stray reveal task (e.g. left over from a crashed teardown) fires
    // against the canceled event: no passcode must go out.
    fx.scheduler
        .add(
            in_minutes(-1),
            TaskKind::RevealMainPasscode,
            EventRef::for_event(&ev).to_payload(),
        )
        .await
        .unwrap();
    fx.scheduler.tick().await.unwrap();

    assert!(fx.chat.dms.lock().unwrap().is_empty());
    assert!(fx.scheduler.tasks().await.is_empty());
}

#[tokio::test]
async fn handler_failure_is_reported_to_the_guild_log() {
    let fx = fixture_with(MockChat::failing_dms());
    let ev = event(1, 7, in_minutes(120));
    fx.manager.create(&ev).await.unwrap();
    // Only the manually queued reveal below should be in play.
    fx.manager.bundle().delete_tasks(&ev).await.unwrap();

    fx.scheduler
        .add(
            in_minutes(-1),
            TaskKind::RevealMainPasscode,
            EventRef::for_event(&ev).to_payload(),
        )
        .await
        .unwrap();
    fx.scheduler.tick().await.unwrap();

    let logs = fx.chat.logs.lock().unwrap().clone();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].0, 1);
    assert!(logs[0].1.contains("failed"));
    // The failing task is gone — no retry storm.
    assert!(fx.scheduler.tasks().await.is_empty());
}

#[tokio::test]
async fn countdown_refresher_edits_and_requeues() {
    let fx = fixture();
    let mut ev = event(1, 7, in_minutes(120));
    ev.recruitment_channel_id = Some(555);
    ev.recruitment_post_id = Some(999);
    fx.manager.create(&ev).await.unwrap();

    let status = StatusPostRef {
        guild_id: 1,
        event_id: 7,
        channel_id: 555,
        message_id: 999,
    };
    fx.scheduler
        .add(in_minutes(-1), TaskKind::UpdateStatusPost, status.to_payload())
        .await
        .unwrap();
    fx.scheduler.tick().await.unwrap();

    let edits = fx.chat.edits.lock().unwrap().clone();
    assert_eq!(edits.len(), 1);
    assert_eq!((edits[0].0, edits[0].1), (555, 999));
    assert!(edits[0].2.contains("starts in"));

    // Re-queued itself for the next refresh.
    let refreshers: Vec<_> = fx
        .scheduler
        .tasks()
        .await
        .into_iter()
        .filter(|t| t.kind == TaskKind::UpdateStatusPost)
        .collect();
    assert_eq!(refreshers.len(), 1);
    assert!(refreshers[0].execution_time > Utc::now());

    // Teardown also clears the refresher (payload is reconstructible).
    fx.manager.cancel(1, 7).await.unwrap();
    assert!(fx.scheduler.tasks().await.is_empty());
}

#[tokio::test]
async fn countdown_refresher_stops_when_the_event_closes() {
    let fx = fixture();
    let mut ev = event(1, 7, in_minutes(120));
    ev.recruitment_channel_id = Some(555);
    ev.recruitment_post_id = Some(999);
    fx.manager.create(&ev).await.unwrap();
    fx.manager.cancel(1, 7).await.unwrap();

    // A refresh that was already in flight when the event was canceled
    // fires once more: it must neither edit the post nor re-queue itself.
    let status = StatusPostRef {
        guild_id: 1,
        event_id: 7,
        channel_id: 555,
        message_id: 999,
    };
    fx.scheduler
        .add(in_minutes(-1), TaskKind::UpdateStatusPost, status.to_payload())
        .await
        .unwrap();
    fx.scheduler.tick().await.unwrap();

    assert!(fx.chat.edits.lock().unwrap().is_empty());
    assert!(fx.scheduler.tasks().await.is_empty());
}
