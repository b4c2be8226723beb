use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{types::Value as SqlValue, types::ValueRef, Connection};
use tracing::warn;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::store::{Cond, Row, Store};

/// Default [`Store`] implementation over a single SQLite connection.
///
/// The connection lives behind a `Mutex`; the guard is the scoped
/// acquisition — every caller locks for exactly one statement and the lock
/// is released on every exit path, including panics and early returns. For
/// a multi-node deployment swap this for a server-backed `Store` impl; the
/// rest of the workspace only sees the trait.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    /// Fresh in-memory database — used by the test suites.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn select(
        &self,
        table: &str,
        fields: &[&str],
        filter: &[Cond],
        sort_fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Vec<Row>> {
        check_ident(table)?;
        for f in fields {
            check_ident(f)?;
        }
        for s in sort_fields {
            check_ident(s)?;
        }

        let cols = if fields.is_empty() {
            "*".to_string()
        } else {
            fields.join(", ")
        };
        let mut sql = format!("SELECT {cols} FROM {table}");
        let params = push_where(&mut sql, filter)?;
        if !sort_fields.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&sort_fields.join(", "));
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                let mut out = Row::new();
                for (i, name) in names.iter().enumerate() {
                    out.insert(name.clone(), read_value(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: &Row) -> Result<Option<i64>> {
        check_ident(table)?;
        let mut cols = Vec::with_capacity(record.len());
        let mut params = Vec::with_capacity(record.len());
        for (field, value) in record {
            check_ident(field)?;
            cols.push(field.as_str());
            params.push(to_param(field, value)?);
        }
        let placeholders = vec!["?"; cols.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            cols.join(", ")
        );

        let conn = self.conn.lock().unwrap();
        conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(Some(conn.last_insert_rowid()))
    }

    async fn update(&self, table: &str, record: &Row, filter: &[Cond]) -> Result<u64> {
        check_ident(table)?;
        let mut sets = Vec::with_capacity(record.len());
        let mut params = Vec::with_capacity(record.len() + filter.len());
        for (field, value) in record {
            check_ident(field)?;
            sets.push(format!("{field} = ?"));
            params.push(to_param(field, value)?);
        }
        let mut sql = format!("UPDATE {table} SET {}", sets.join(", "));
        params.extend(push_where(&mut sql, filter)?);

        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(changed as u64)
    }

    async fn delete(&self, table: &str, filter: &[Cond]) -> Result<u64> {
        check_ident(table)?;
        let mut sql = format!("DELETE FROM {table}");
        let params = push_where(&mut sql, filter)?;

        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(deleted as u64)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Reject anything that is not a plain `[A-Za-z][A-Za-z0-9_]*` identifier.
///
/// Table and column names are interpolated into SQL text (placeholders only
/// cover values), so they must never carry caller-controlled punctuation.
fn check_ident(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(ident.to_string()))
    }
}

/// Append a WHERE clause for `filter` to `sql`, returning the bound params.
///
/// `Null` conditions become `IS NULL` and bind nothing.
fn push_where(sql: &mut String, filter: &[Cond]) -> Result<Vec<SqlValue>> {
    if filter.is_empty() {
        return Ok(Vec::new());
    }
    let mut clauses = Vec::with_capacity(filter.len());
    let mut params = Vec::new();
    for cond in filter {
        check_ident(&cond.field)?;
        if cond.value.is_null() {
            clauses.push(format!("{} IS NULL", cond.field));
        } else {
            clauses.push(format!("{} = ?", cond.field));
            params.push(to_param(&cond.field, &cond.value)?);
        }
    }
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
    Ok(params)
}

fn to_param(field: &str, value: &serde_json::Value) -> Result<SqlValue> {
    use serde_json::Value;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                return Err(StoreError::UnsupportedValue {
                    field: field.to_string(),
                });
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // Collections are stored as their JSON text.
        other => SqlValue::Text(other.to_string()),
    })
}

fn read_value(value: ValueRef<'_>) -> serde_json::Value {
    use serde_json::Value;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => {
            warn!("blob column read as null — arsenal tables store no blobs");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_row(time: &str, task_type: i64, data: &str) -> Row {
        let mut row = Row::new();
        row.insert("execution_time".into(), json!(time));
        row.insert("task_type".into(), json!(task_type));
        row.insert("data".into(), json!(data));
        row
    }

    #[tokio::test]
    async fn insert_returns_generated_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id1 = store
            .insert("tasks", &task_row("2026-01-01T10:00:00.000000Z", 0, "{}"))
            .await
            .unwrap();
        let id2 = store
            .insert("tasks", &task_row("2026-01-01T11:00:00.000000Z", 1, "{}"))
            .await
            .unwrap();
        assert!(id1.is_some());
        assert!(id2.unwrap() > id1.unwrap());
    }

    #[tokio::test]
    async fn select_sorts_and_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("tasks", &task_row("2026-01-01T12:00:00.000000Z", 1, "b"))
            .await
            .unwrap();
        store
            .insert("tasks", &task_row("2026-01-01T10:00:00.000000Z", 1, "a"))
            .await
            .unwrap();
        store
            .insert("tasks", &task_row("2026-01-01T11:00:00.000000Z", 2, "c"))
            .await
            .unwrap();

        let rows = store
            .select(
                "tasks",
                &[],
                &[Cond::new("task_type", 1)],
                &["execution_time", "id"],
                None,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["data"], json!("a"));
        assert_eq!(rows[1]["data"], json!("b"));
    }

    #[tokio::test]
    async fn update_and_delete_report_row_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("tasks", &task_row("2026-01-01T10:00:00.000000Z", 3, "{}"))
            .await
            .unwrap();

        let mut patch = Row::new();
        patch.insert("description".into(), json!("updated"));
        let changed = store
            .update("tasks", &patch, &[Cond::new("task_type", 3)])
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let deleted = store
            .delete("tasks", &[Cond::new("task_type", 3)])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        let deleted_again = store
            .delete("tasks", &[Cond::new("task_type", 3)])
            .await
            .unwrap();
        assert_eq!(deleted_again, 0);
    }

    #[tokio::test]
    async fn null_condition_matches_is_null() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("tasks", &task_row("2026-01-01T10:00:00.000000Z", 0, "{}"))
            .await
            .unwrap();
        let rows = store
            .select(
                "tasks",
                &["id"],
                &[Cond::new("description", serde_json::Value::Null)],
                &[],
                None,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn bad_identifier_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .select("tasks; DROP TABLE tasks", &[], &[], &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }
}
