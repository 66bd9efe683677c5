//! Storage configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! file: db/app.sqlite3
//! debug: false
//! ```
//!
//! The file `:memory:` opens a private in-memory database.

use std::fmt;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Marker accepted in place of a path for an in-memory database.
pub const MEMORY_MARKER: &str = ":memory:";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl DatabaseLocation {
    /// Parses a path, treating `:memory:` as [`DatabaseLocation::Memory`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use litemodel_sqlite::DatabaseLocation;
    /// assert_eq!(DatabaseLocation::parse(":memory:"), DatabaseLocation::Memory);
    /// assert!(matches!(DatabaseLocation::parse("app.sqlite3"), DatabaseLocation::File(_)));
    /// ```
    pub fn parse(raw: &str) -> Self {
        if raw == MEMORY_MARKER {
            DatabaseLocation::Memory
        } else {
            DatabaseLocation::File(PathBuf::from(raw))
        }
    }
}

impl Default for DatabaseLocation {
    fn default() -> Self {
        DatabaseLocation::File(PathBuf::from("app.sqlite3"))
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => f.write_str(MEMORY_MARKER),
        }
    }
}

impl Serialize for DatabaseLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DatabaseLocation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(DatabaseLocation::parse(&raw))
    }
}

/// Connection settings for [`SqliteStorage`](crate::SqliteStorage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file, or `:memory:`.
    pub file: DatabaseLocation,
    /// Log every statement and its parameters at debug level.
    pub debug: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file: DatabaseLocation::default(),
            debug: true,
        }
    }
}

impl StoreConfig {
    /// Configuration for a private in-memory database.
    pub fn memory() -> Self {
        Self {
            file: DatabaseLocation::Memory,
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SqliteError::IoError) if the file cannot be read, or
    /// [`YamlError`](crate::SqliteError::YamlError) if parsing fails.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }
}
