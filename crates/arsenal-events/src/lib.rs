//! `arsenal-events` — scheduled raid events and their task bundles.
//!
//! # Overview
//!
//! An [`types::Event`] is a scheduled occurrence (a raid run) that owns a
//! derived bundle of tasks: finalize at start time, passcode reveals ahead
//! of it, recruitment-post cleanup after it. [`bundle::derive_bundle`]
//! computes the bundle deterministically from the event's current
//! attributes and its type template; the [`manager::EventManager`] keeps
//! the queues consistent with the event through create / edit / cancel /
//! finish.
//!
//! The consistency rule: whenever an event's timestamp, passcode mode, or
//! support flag changes, the whole bundle is deleted and re-derived —
//! tasks are never edited in place.
//!
//! Concrete [`arsenal_scheduler::TaskHandler`] implementations live in
//! [`handlers`]; [`handlers::all_handlers`] assembles the registry list
//! for process startup.

pub mod bundle;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod types;

pub use bundle::{derive_bundle, EventBundleManager, TaskSpec};
pub use error::{EventError, Result};
pub use manager::EventManager;
pub use types::{Event, EventRef};
