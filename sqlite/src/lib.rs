//! SQLite storage backend for litemodel records.
//!
//! This crate implements [`Storage`](litemodel_core::Storage) over a single
//! `rusqlite` connection, so that records, scopes and migrations from
//! `litemodel-core` run against an embedded SQLite database.
//!
//! # Architecture
//!
//! - **`adapter`**: [`SqliteStorage`], statement generation and execution
//! - **`config`**: [`StoreConfig`], loadable from YAML
//! - **`convert`**: attribute value ↔ SQLite value conversion
//!
//! # Quick start
//!
//! ```no_run
//! use litemodel_core::{MigrationDefinition, Migrator, TableDefinition};
//! use litemodel_sqlite::{StoreConfig, connect};
//!
//! let store = connect(&StoreConfig::file("app.sqlite3")).unwrap();
//! let mut migrator = Migrator::new(
//!     &store,
//!     vec![MigrationDefinition::new(1, None).create_table(TableDefinition::new("events").text("name"))],
//! )
//! .unwrap();
//!
//! let applied = migrator.run().unwrap();
//! println!("applied {applied:?}");
//! ```

mod adapter;
mod config;
mod convert;
mod error;

pub use adapter::SqliteStorage;
pub use config::{DatabaseLocation, MEMORY_MARKER, StoreConfig};
pub use error::{Result, SqliteError};

use litemodel_core::Store;

/// Opens the configured database and wraps it in a [`Store`].
pub fn connect(config: &StoreConfig) -> Result<Store<SqliteStorage>> {
    Ok(Store::new(SqliteStorage::open(config)?))
}
