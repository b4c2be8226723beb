//! `arsenal-core` — shared types and collaborator seams for the arsenal bot.
//!
//! This crate carries everything the scheduling core and the event domain
//! both need: the [`types::TaskKind`] enumeration with its stable wire
//! codes, the opaque [`types::TaskPayload`] map handed to task handlers,
//! configuration loading (TOML + `ARSENAL_*` env overrides), and the
//! [`chat::ChatClient`] trait behind which the actual chat platform lives.
//!
//! The chat platform itself is deliberately not implemented here — handlers
//! only ever talk to it through the trait, using ids carried in payloads.

pub mod chat;
pub mod config;
pub mod error;
pub mod types;

pub use chat::{ChatClient, ChatError};
pub use config::ArsenalConfig;
pub use error::{ArsenalError, Result};
pub use types::{TaskKind, TaskPayload};
