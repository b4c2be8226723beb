use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key/value data handed to a task handler.
///
/// Persistent tasks round-trip this map through the `data` TEXT column of
/// the `tasks` table; runtime tasks keep it in memory only. Handlers parse
/// the map into their own typed structs at fire time.
pub type TaskPayload = serde_json::Map<String, serde_json::Value>;

/// Enumerated identifier selecting which handler processes a task.
///
/// The integer code is the wire format stored in the `task_type` column —
/// codes are append-only and must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Mark an event finished once its start time arrives.
    FinalizeEvent,
    /// Send the main-party passcode to the raid leaders.
    RevealMainPasscode,
    /// Send each party leader the passcode ahead of the run.
    NotifyPartyLeaders,
    /// Send the support-party passcode to the raid leaders.
    RevealSupportPasscode,
    /// Delete the temporary recruitment post after the run started.
    DeleteRecruitmentPost,
    /// Refresh the countdown on the recruitment post (runtime-only).
    UpdateStatusPost,
}

impl TaskKind {
    /// Stable integer code stored in the `task_type` column.
    pub fn code(self) -> i64 {
        match self {
            TaskKind::FinalizeEvent => 0,
            TaskKind::RevealMainPasscode => 1,
            TaskKind::NotifyPartyLeaders => 2,
            TaskKind::RevealSupportPasscode => 3,
            TaskKind::DeleteRecruitmentPost => 4,
            TaskKind::UpdateStatusPost => 5,
        }
    }

    /// Resolve a stored code back to a kind. `None` for codes written by a
    /// newer version of the bot than the one reading them.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TaskKind::FinalizeEvent),
            1 => Some(TaskKind::RevealMainPasscode),
            2 => Some(TaskKind::NotifyPartyLeaders),
            3 => Some(TaskKind::RevealSupportPasscode),
            4 => Some(TaskKind::DeleteRecruitmentPost),
            5 => Some(TaskKind::UpdateStatusPost),
            _ => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::FinalizeEvent => "finalize_event",
            TaskKind::RevealMainPasscode => "reveal_main_passcode",
            TaskKind::NotifyPartyLeaders => "notify_party_leaders",
            TaskKind::RevealSupportPasscode => "reveal_support_passcode",
            TaskKind::DeleteRecruitmentPost => "delete_recruitment_post",
            TaskKind::UpdateStatusPost => "update_status_post",
        };
        write!(f, "{s}")
    }
}

/// Format a UTC instant for storage.
///
/// Fixed-width microsecond precision so lexicographic ordering of the TEXT
/// column equals chronological ordering.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into a UTC instant.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read an unsigned integer field out of an opaque payload.
///
/// Accepts both JSON numbers and numeric strings — payloads written by
/// older bot versions stored snowflake ids as strings.
pub fn payload_u64(payload: &TaskPayload, key: &str) -> Option<u64> {
    match payload.get(key)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
