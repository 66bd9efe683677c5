//! Error types for the SQLite storage backend.
//!
//! Adapter failures convert into [`ModelError::Storage`] so they pass
//! through the record layer unchanged.

use litemodel_core::ModelError;
use thiserror::Error;

/// Errors that can occur in the SQLite backend.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A stored value has no attribute representation.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Table or column name contains invalid characters.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// Invalid storage configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Failure reading a configuration file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed YAML configuration.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl From<SqliteError> for ModelError {
    fn from(err: SqliteError) -> Self {
        ModelError::storage(err)
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    litemodel_core::validate_identifier(name).map_err(|_| SqliteError::InvalidIdentifier(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_into_storage_error() {
        let err: ModelError = SqliteError::ConversionError("blob".to_string()).into();
        assert!(matches!(err, ModelError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: conversion error: blob");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("events").is_ok());
        assert!(matches!(
            validate_identifier("events; --"),
            Err(SqliteError::InvalidIdentifier(name)) if name == "events; --"
        ));
    }
}
