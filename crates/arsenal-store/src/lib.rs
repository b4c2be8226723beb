//! `arsenal-store` — relational-store collaborator contract and the default
//! SQLite implementation.
//!
//! The scheduling core consumes storage exclusively through the generic
//! [`store::Store`] trait (select / insert / update / delete over JSON
//! rows). [`sqlite::SqliteStore`] is the implementation the host bot and
//! the test suite run against; swapping in a different backend only means
//! implementing the trait.

pub mod db;
pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
pub use store::{Cond, Row, Store};
