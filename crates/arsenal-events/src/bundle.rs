use arsenal_core::config::{EventTemplate, EventsConfig};
use arsenal_core::{TaskKind, TaskPayload};
use arsenal_scheduler::Scheduler;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::types::{Event, EventRef, RecruitmentRef, StatusPostRef};

/// Every kind `derive_bundle` can produce. `delete_tasks` walks this list,
/// so adding a kind to the derivation without extending the list here is
/// impossible to get past the derivation test.
pub const BUNDLE_KINDS: [TaskKind; 5] = [
    TaskKind::FinalizeEvent,
    TaskKind::RevealMainPasscode,
    TaskKind::NotifyPartyLeaders,
    TaskKind::RevealSupportPasscode,
    TaskKind::DeleteRecruitmentPost,
];

/// One derived task: what to run, when, and with which payload.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub time: DateTime<Utc>,
    pub payload: TaskPayload,
}

/// Derive the task bundle from an event's current attributes.
///
/// Deterministic: equal event + template + grace always yields the same
/// specs, which is what makes delete-then-recreate idempotent.
pub fn derive_bundle(event: &Event, template: &EventTemplate, grace: Duration) -> Vec<TaskSpec> {
    let ident = EventRef::for_event(event).to_payload();
    let mut specs = vec![TaskSpec {
        kind: TaskKind::FinalizeEvent,
        time: event.timestamp,
        payload: ident.clone(),
    }];

    if event.passcodes_enabled() {
        specs.push(TaskSpec {
            kind: TaskKind::RevealMainPasscode,
            time: event.timestamp - Duration::minutes(template.main_passcode_delay_min),
            payload: ident.clone(),
        });
        specs.push(TaskSpec {
            kind: TaskKind::NotifyPartyLeaders,
            time: event.timestamp - Duration::minutes(template.pl_passcode_delay_min),
            payload: ident.clone(),
        });
        if event.use_support {
            specs.push(TaskSpec {
                kind: TaskKind::RevealSupportPasscode,
                time: event.timestamp - Duration::minutes(template.support_passcode_delay_min),
                payload: ident,
            });
        }
    }

    if template.use_recruitment_posts && template.delete_recruitment_posts {
        if let (Some(channel_id), Some(_)) =
            (event.recruitment_channel_id, event.recruitment_post_id)
        {
            specs.push(TaskSpec {
                kind: TaskKind::DeleteRecruitmentPost,
                time: event.timestamp + grace,
                payload: RecruitmentRef {
                    guild_id: event.guild_id,
                    event_id: event.event_id,
                    channel_id,
                }
                .to_payload(),
            });
        }
    }

    specs
}

/// Keeps the queues in sync with an event's derived bundle.
pub struct EventBundleManager {
    scheduler: Scheduler,
    config: EventsConfig,
}

impl EventBundleManager {
    pub fn new(scheduler: Scheduler, config: EventsConfig) -> Self {
        Self { scheduler, config }
    }

    /// Resolve the event's template, falling back to the defaults for
    /// unknown types.
    pub fn template_for(&self, event: &Event) -> EventTemplate {
        self.config
            .templates
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Queue every task the event's current configuration derives.
    pub async fn create_tasks(&self, event: &Event) -> Result<()> {
        let template = self.template_for(event);
        let grace = Duration::minutes(self.config.recruitment_delete_grace_min);
        let specs = derive_bundle(event, &template, grace);
        debug!(
            guild_id = event.guild_id,
            event_id = event.event_id,
            count = specs.len(),
            "creating task bundle"
        );
        for spec in specs {
            self.scheduler.add(spec.time, spec.kind, spec.payload).await?;
        }
        Ok(())
    }

    /// Remove every bundle task belonging to the event, across all kinds
    /// the derivation can produce, plus the runtime countdown refresher
    /// when its payload is reconstructible from the event row.
    ///
    /// Returns how many tasks went away.
    pub async fn delete_tasks(&self, event: &Event) -> Result<u64> {
        let ident = EventRef::for_event(event).to_payload();
        let mut removed = 0u64;

        for kind in BUNDLE_KINDS {
            let payload = match kind {
                TaskKind::DeleteRecruitmentPost => match event.recruitment_channel_id {
                    Some(channel_id) => RecruitmentRef {
                        guild_id: event.guild_id,
                        event_id: event.event_id,
                        channel_id,
                    }
                    .to_payload(),
                    None => continue,
                },
                _ => ident.clone(),
            };
            removed += self.scheduler.remove_by_data(kind, &payload).await?;
        }

        if let (Some(channel_id), Some(message_id)) =
            (event.recruitment_channel_id, event.recruitment_post_id)
        {
            let status = StatusPostRef {
                guild_id: event.guild_id,
                event_id: event.event_id,
                channel_id,
                message_id,
            };
            removed += self
                .scheduler
                .remove_by_data(TaskKind::UpdateStatusPost, &status.to_payload())
                .await?;
        }

        debug!(
            guild_id = event.guild_id,
            event_id = event.event_id,
            removed,
            "deleted task bundle"
        );
        Ok(removed)
    }

    /// Full bundle replacement: delete whatever is queued for the event,
    /// then derive and queue from its current attributes.
    ///
    /// Not atomic — a crash between the two steps leaves the event without
    /// tasks until the next successful edit.
    pub async fn recreate_tasks(&self, event: &Event) -> Result<()> {
        self.delete_tasks(event).await?;
        self.create_tasks(event).await
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_at(ts: DateTime<Utc>) -> Event {
        Event {
            guild_id: 1,
            event_id: 7,
            timestamp: ts,
            event_type: "ba".into(),
            description: "test run".into(),
            use_support: false,
            auto_passcode: true,
            passcode_main: "1234".into(),
            passcode_support: String::new(),
            raid_leaders: vec![11],
            party_leaders: vec![21, 22],
            recruitment_channel_id: None,
            recruitment_post_id: None,
            canceled: false,
            finished: false,
        }
    }

    fn template() -> EventTemplate {
        EventTemplate {
            main_passcode_delay_min: 15,
            pl_passcode_delay_min: 45,
            support_passcode_delay_min: 30,
            use_recruitment_posts: false,
            delete_recruitment_posts: false,
        }
    }

    #[test]
    fn standard_event_derives_three_tasks() {
        let t = Utc.with_ymd_and_hms(2026, 6, 20, 19, 0, 0).unwrap();
        let specs = derive_bundle(&event_at(t), &template(), Duration::minutes(30));

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].kind, TaskKind::FinalizeEvent);
        assert_eq!(specs[0].time, t);
        assert_eq!(specs[1].kind, TaskKind::RevealMainPasscode);
        assert_eq!(specs[1].time, t - Duration::minutes(15));
        assert_eq!(specs[2].kind, TaskKind::NotifyPartyLeaders);
        assert_eq!(specs[2].time, t - Duration::minutes(45));
    }

    #[test]
    fn support_adds_a_fourth_reveal() {
        let t = Utc.with_ymd_and_hms(2026, 6, 20, 19, 0, 0).unwrap();
        let mut event = event_at(t);
        event.use_support = true;

        let specs = derive_bundle(&event, &template(), Duration::minutes(30));
        assert_eq!(specs.len(), 4);
        assert_eq!(specs[3].kind, TaskKind::RevealSupportPasscode);
        assert_eq!(specs[3].time, t - Duration::minutes(30));
    }

    #[test]
    fn disabled_passcodes_leave_only_finalize() {
        let t = Utc.with_ymd_and_hms(2026, 6, 20, 19, 0, 0).unwrap();
        let mut event = event_at(t);
        event.auto_passcode = false;

        let specs = derive_bundle(&event, &template(), Duration::minutes(30));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, TaskKind::FinalizeEvent);
    }

    #[test]
    fn recruitment_cleanup_fires_after_grace() {
        let t = Utc.with_ymd_and_hms(2026, 6, 20, 19, 0, 0).unwrap();
        let mut event = event_at(t);
        event.recruitment_channel_id = Some(555);
        event.recruitment_post_id = Some(999);
        let mut tpl = template();
        tpl.use_recruitment_posts = true;
        tpl.delete_recruitment_posts = true;

        let specs = derive_bundle(&event, &tpl, Duration::minutes(30));
        let cleanup = specs
            .iter()
            .find(|s| s.kind == TaskKind::DeleteRecruitmentPost)
            .expect("cleanup task derived");
        assert_eq!(cleanup.time, t + Duration::minutes(30));
        assert_eq!(
            RecruitmentRef::from_payload(&cleanup.payload).unwrap().channel_id,
            555
        );
    }

    #[test]
    fn every_derived_kind_is_in_bundle_kinds() {
        let t = Utc.with_ymd_and_hms(2026, 6, 20, 19, 0, 0).unwrap();
        let mut event = event_at(t);
        event.use_support = true;
        event.recruitment_channel_id = Some(555);
        event.recruitment_post_id = Some(999);
        let mut tpl = template();
        tpl.use_recruitment_posts = true;
        tpl.delete_recruitment_posts = true;

        for spec in derive_bundle(&event, &tpl, Duration::minutes(30)) {
            assert!(BUNDLE_KINDS.contains(&spec.kind));
        }
    }
}
