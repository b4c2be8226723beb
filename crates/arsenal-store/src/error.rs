use thiserror::Error;

/// Errors that can occur within the storage subsystem.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A table or field name is not a plain identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A filter or record value cannot be represented in the store.
    #[error("Unsupported value for field {field}")]
    UnsupportedValue { field: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
