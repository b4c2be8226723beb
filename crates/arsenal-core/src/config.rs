use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (arsenal.toml + ARSENAL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArsenalConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Scheduling-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Poll interval of the dispatch loop in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// How many times a failed store operation is retried before giving up.
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            store_retry_attempts: default_store_retry_attempts(),
        }
    }
}

/// Event-domain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Minutes after the event start before the recruitment post is deleted.
    #[serde(default = "default_recruitment_grace_min")]
    pub recruitment_delete_grace_min: i64,
    /// Seconds between countdown refreshes of the recruitment post.
    #[serde(default = "default_status_refresh_secs")]
    pub status_refresh_secs: i64,
    /// Named event templates, keyed by the `event_type` an event references.
    /// Unknown types fall back to [`EventTemplate::default`].
    #[serde(default)]
    pub templates: HashMap<String, EventTemplate>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            recruitment_delete_grace_min: default_recruitment_grace_min(),
            status_refresh_secs: default_status_refresh_secs(),
            templates: HashMap::new(),
        }
    }
}

/// Per-event-type timing and recruitment behavior.
///
/// Delays are minutes *before* the event start at which the corresponding
/// task fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTemplate {
    #[serde(default = "default_main_delay")]
    pub main_passcode_delay_min: i64,
    #[serde(default = "default_pl_delay")]
    pub pl_passcode_delay_min: i64,
    #[serde(default = "default_support_delay")]
    pub support_passcode_delay_min: i64,
    #[serde(default = "bool_true")]
    pub use_recruitment_posts: bool,
    #[serde(default = "bool_true")]
    pub delete_recruitment_posts: bool,
}

impl Default for EventTemplate {
    fn default() -> Self {
        Self {
            main_passcode_delay_min: default_main_delay(),
            pl_passcode_delay_min: default_pl_delay(),
            support_passcode_delay_min: default_support_delay(),
            use_recruitment_posts: true,
            delete_recruitment_posts: true,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_tick_secs() -> u64 {
    1
}
fn default_store_retry_attempts() -> u32 {
    3
}
fn default_recruitment_grace_min() -> i64 {
    30
}
fn default_status_refresh_secs() -> i64 {
    60
}
fn default_main_delay() -> i64 {
    15
}
fn default_pl_delay() -> i64 {
    45
}
fn default_support_delay() -> i64 {
    30
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.arsenal/arsenal.db", home)
}

impl ArsenalConfig {
    /// Load config from a TOML file with ARSENAL_* env var overrides.
    ///
    /// Falls back to `~/.arsenal/arsenal.toml` when no path is given; a
    /// missing file yields the defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ArsenalConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ARSENAL_").split("_"))
            .extract()
            .map_err(|e| crate::error::ArsenalError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.arsenal/arsenal.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ArsenalConfig::default();
        assert_eq!(cfg.scheduler.tick_secs, 1);
        assert_eq!(cfg.events.recruitment_delete_grace_min, 30);
        assert!(cfg.events.templates.is_empty());
    }

    #[test]
    fn template_defaults_match_standard_run() {
        let tpl = EventTemplate::default();
        assert_eq!(tpl.main_passcode_delay_min, 15);
        assert_eq!(tpl.pl_passcode_delay_min, 45);
        assert!(tpl.use_recruitment_posts);
    }
}
