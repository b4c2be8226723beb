use arsenal_core::types::{format_ts, parse_ts};
use arsenal_core::TaskPayload;
use arsenal_store::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub(crate) const EVENTS_TABLE: &str = "events";

/// A scheduled raid run. Identity is `(guild_id, event_id)`.
///
/// Events are soft-deleted: `canceled`/`finished` flip to true and the row
/// stays, so past runs remain queryable. The task bundle is torn down at
/// the same moment the flag flips.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub guild_id: u64,
    pub event_id: u64,
    /// Start of the run, UTC.
    pub timestamp: DateTime<Utc>,
    /// Template reference — resolves timing delays and recruitment flags.
    pub event_type: String,
    pub description: String,
    /// Whether a support party runs alongside the main parties.
    pub use_support: bool,
    /// When false, passcodes are handled manually and no reveal tasks are
    /// scheduled.
    pub auto_passcode: bool,
    pub passcode_main: String,
    pub passcode_support: String,
    pub raid_leaders: Vec<u64>,
    pub party_leaders: Vec<u64>,
    pub recruitment_channel_id: Option<u64>,
    pub recruitment_post_id: Option<u64>,
    pub canceled: bool,
    pub finished: bool,
}

impl Event {
    pub fn is_active(&self) -> bool {
        !self.canceled && !self.finished
    }

    pub fn passcodes_enabled(&self) -> bool {
        self.auto_passcode
    }

    /// Encode for the `events` table. Leader lists go into their columns as
    /// JSON text; ids as integers.
    pub(crate) fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("guild_id".into(), (self.guild_id as i64).into());
        row.insert("event_id".into(), (self.event_id as i64).into());
        row.insert("timestamp".into(), format_ts(self.timestamp).into());
        row.insert("event_type".into(), self.event_type.clone().into());
        row.insert("description".into(), self.description.clone().into());
        row.insert("use_support".into(), self.use_support.into());
        row.insert("auto_passcode".into(), self.auto_passcode.into());
        row.insert("passcode_main".into(), self.passcode_main.clone().into());
        row.insert(
            "passcode_support".into(),
            self.passcode_support.clone().into(),
        );
        row.insert(
            "raid_leaders".into(),
            serde_json::to_string(&self.raid_leaders)
                .unwrap_or_else(|_| "[]".into())
                .into(),
        );
        row.insert(
            "party_leaders".into(),
            serde_json::to_string(&self.party_leaders)
                .unwrap_or_else(|_| "[]".into())
                .into(),
        );
        row.insert(
            "recruitment_channel_id".into(),
            opt_id(self.recruitment_channel_id),
        );
        row.insert(
            "recruitment_post_id".into(),
            opt_id(self.recruitment_post_id),
        );
        row.insert("canceled".into(), self.canceled.into());
        row.insert("finished".into(), self.finished.into());
        row
    }

    /// Decode a stored row. `None` (with a warning) when required columns
    /// are missing or unparseable.
    pub(crate) fn from_row(row: &Row) -> Option<Event> {
        let guild_id = read_id(row, "guild_id")?;
        let event_id = read_id(row, "event_id")?;
        let timestamp = match row.get("timestamp").and_then(|v| v.as_str()).and_then(parse_ts) {
            Some(ts) => ts,
            None => {
                warn!(guild_id, event_id, "event row with unparseable timestamp — skipping");
                return None;
            }
        };
        Some(Event {
            guild_id,
            event_id,
            timestamp,
            event_type: read_str(row, "event_type"),
            description: read_str(row, "description"),
            use_support: read_flag(row, "use_support"),
            auto_passcode: read_flag(row, "auto_passcode"),
            passcode_main: read_str(row, "passcode_main"),
            passcode_support: read_str(row, "passcode_support"),
            raid_leaders: read_id_list(row, "raid_leaders"),
            party_leaders: read_id_list(row, "party_leaders"),
            recruitment_channel_id: read_id(row, "recruitment_channel_id"),
            recruitment_post_id: read_id(row, "recruitment_post_id"),
            canceled: read_flag(row, "canceled"),
            finished: read_flag(row, "finished"),
        })
    }
}

fn opt_id(id: Option<u64>) -> serde_json::Value {
    match id {
        Some(id) => (id as i64).into(),
        None => serde_json::Value::Null,
    }
}

fn read_id(row: &Row, field: &str) -> Option<u64> {
    row.get(field).and_then(|v| v.as_i64()).map(|i| i as u64)
}

fn read_str(row: &Row, field: &str) -> String {
    row.get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn read_flag(row: &Row, field: &str) -> bool {
    row.get(field).and_then(|v| v.as_i64()).unwrap_or(0) != 0
}

fn read_id_list(row: &Row, field: &str) -> Vec<u64> {
    row.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Identity payload carried by every bundle task: enough to find the event
/// again and to be matched exactly by `remove_by_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRef {
    pub guild_id: u64,
    pub event_id: u64,
}

impl EventRef {
    pub fn for_event(event: &Event) -> Self {
        Self {
            guild_id: event.guild_id,
            event_id: event.event_id,
        }
    }

    pub fn to_payload(&self) -> TaskPayload {
        ref_to_payload(self)
    }

    pub fn from_payload(payload: &TaskPayload) -> Option<Self> {
        payload_to_ref(payload)
    }
}

/// Payload of the recruitment-post cleanup task — the channel id rides
/// along so the handler can delete without a channel lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentRef {
    pub guild_id: u64,
    pub event_id: u64,
    pub channel_id: u64,
}

impl RecruitmentRef {
    pub fn to_payload(&self) -> TaskPayload {
        ref_to_payload(self)
    }

    pub fn from_payload(payload: &TaskPayload) -> Option<Self> {
        payload_to_ref(payload)
    }
}

/// Payload of the runtime-only countdown refresher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPostRef {
    pub guild_id: u64,
    pub event_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

impl StatusPostRef {
    pub fn to_payload(&self) -> TaskPayload {
        ref_to_payload(self)
    }

    pub fn from_payload(payload: &TaskPayload) -> Option<Self> {
        payload_to_ref(payload)
    }
}

fn ref_to_payload<T: Serialize>(value: &T) -> TaskPayload {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => TaskPayload::new(),
    }
}

fn payload_to_ref<T: for<'de> Deserialize<'de>>(payload: &TaskPayload) -> Option<T> {
    serde_json::from_value(serde_json::Value::Object(payload.clone())).ok()
}
