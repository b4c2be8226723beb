use async_trait::async_trait;

use crate::error::Result;

/// One stored record, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A single equality condition (`field = value`) in a filter.
///
/// All conditions in a filter slice are AND-ed together.
#[derive(Debug, Clone)]
pub struct Cond {
    pub field: String,
    pub value: serde_json::Value,
}

impl Cond {
    pub fn new(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Relational-store collaborator contract.
///
/// The scheduling core and the event domain only ever see this trait; the
/// concrete backend (SQLite here, anything else in a different host) stays
/// behind it. Implementations must be `Send + Sync` so a single store can
/// be shared via `Arc` across the scheduler and command handlers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read rows from `table`.
    ///
    /// `fields` empty means all columns. `sort_fields` are applied in order,
    /// ascending. `limit` caps the result set when given.
    async fn select(
        &self,
        table: &str,
        fields: &[&str],
        filter: &[Cond],
        sort_fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Row>>;

    /// Insert one record. Returns the generated row id when the table has
    /// an auto-increment key.
    async fn insert(&self, table: &str, record: &Row) -> Result<Option<i64>>;

    /// Update all rows matching `filter` with the values in `record`.
    /// Returns the number of rows changed.
    async fn update(&self, table: &str, record: &Row, filter: &[Cond]) -> Result<u64>;

    /// Delete all rows matching `filter`. Returns the number of rows deleted.
    async fn delete(&self, table: &str, filter: &[Cond]) -> Result<u64>;
}
