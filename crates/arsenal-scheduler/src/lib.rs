//! `arsenal-scheduler` — hybrid task queue and polling dispatch loop.
//!
//! # Overview
//!
//! Tasks are units of deferred work: a kind, a due time, and an opaque JSON
//! payload. Two queues hold them side by side and the [`Scheduler`] polls
//! both once per second, executing at most one task at a time:
//!
//! | Queue      | Backing                | Survives restart | For                          |
//! |------------|------------------------|------------------|------------------------------|
//! | persistent | store (`tasks` table)  | yes              | passcode reveals, cleanup    |
//! | runtime    | in-memory `Vec`        | no (by design)   | countdown refreshes          |
//!
//! Which queue a task lands in is decided solely by its kind's handler
//! ([`TaskHandler::is_runtime_only`]) — a task is never in both.
//!
//! Handlers are registered explicitly at startup via
//! [`HandlerRegistry::new`]; there is no runtime discovery. Execution
//! failures are routed to the handler's `on_failure` hook, and a failing
//! hook is contained at the loop boundary — one bad task never takes the
//! loop down, and the task is removed either way.

pub mod error;
pub mod handler;
pub mod persistent;
pub mod runtime;
pub mod scheduler;
pub mod signal;
pub mod types;

pub use error::{Result, SchedulerError};
pub use handler::{HandlerRegistry, TaskHandler};
pub use scheduler::Scheduler;
pub use types::{Signature, Task};
