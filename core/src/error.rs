//! Error types for record, scope, serialization and migration operations.
//!
//! Errors fall into five groups: configuration errors raised while
//! declaring tables, columns and serializers; type mismatches raised when a
//! value meets a column it cannot be stored in; parse errors for malformed
//! stored values; record state errors; and storage errors passed through
//! unchanged from the [`Storage`](crate::Storage) implementation.

use thiserror::Error;

/// Errors that can occur while mapping records to an embedded SQL store.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Column type other than `integer`, `text` or `float`.
    #[error("unrecognized column type: {0}")]
    UnknownColumnType(String),

    /// Column option key other than `primary`, `null` or `default`.
    #[error("unrecognized column option: {0}")]
    UnknownColumnOption(String),

    /// Aggregate function other than count, maximum, minimum, sum or average.
    #[error("unrecognized calculation: {0}")]
    UnknownCalculation(String),

    /// Serializer tag other than `time`, `boolean`, `json` or `date`.
    #[error("unknown serializer: {0}")]
    UnknownSerializer(String),

    /// Table, column or index name containing characters other than
    /// alphanumerics and underscores.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// Two declared migrations share a version number.
    #[error("duplicate migration version: {0}")]
    DuplicateMigration(i64),

    /// A record attribute or registered serializer has no backing column.
    #[error("table {table} has no column for attribute {attribute}")]
    UnknownAttribute { table: String, attribute: String },

    /// A serializer was used against a column type it does not support.
    #[error("cannot serialize {serializer} to {column_type}")]
    TypeMismatch {
        serializer: &'static str,
        column_type: &'static str,
    },

    /// A serializer was handed a value of a kind it does not convert.
    #[error("{serializer} serializer cannot store a {kind} value")]
    UnexpectedValue {
        serializer: &'static str,
        kind: &'static str,
    },

    /// An attribute value could not be read as the requested Rust type.
    #[error("attribute {attribute} is not a valid {expected}")]
    InvalidAttribute {
        attribute: String,
        expected: &'static str,
    },

    /// A stored value (timestamp, date, numeric default) could not be parsed.
    #[error("invalid value: {0:?}")]
    Parse(String),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Attempt to delete a record that was never saved.
    #[error("cannot delete an unpersisted record")]
    UnpersistedDelete,

    /// Primary-key operation on a table declared without a primary key.
    #[error("table {0} has no primary key")]
    NoPrimaryKey(String),

    /// Schema introspection found no columns for a table.
    #[error("table {0} does not exist")]
    MissingTable(String),

    /// Failure reported by the underlying storage connection.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Wraps a storage-layer error.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ModelError::Storage(err.into())
    }
}

/// Convenience alias for results with [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Validates that a table, column or index name contains only alphanumeric
/// characters and underscores.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ModelError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}
