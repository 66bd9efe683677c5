//! Record model, scopes, attribute serializers and migrations for embedded
//! SQL stores.
//!
//! This crate holds everything that does not depend on a particular SQL
//! engine:
//!
//! - [`Record`]: a typed entity mapped to one table, with its
//!   [`RecordDescriptor`] built by introspecting that table.
//! - [`Store`]: the persistence lifecycle (`build`, `create`, `save`,
//!   `delete`) and the per-type descriptor registry.
//! - [`Scope`] and [`Query`]: immutable query builders rendering
//!   `WHERE ... ORDER BY ... LIMIT ...` with positional parameters.
//! - [`Serializer`]: conversions between attribute values and the
//!   storage-native representation of a column (booleans, times, dates,
//!   JSON, or a custom [`AttributeSerializer`]).
//! - [`TableDefinition`], [`IndexDefinition`], [`MigrationDefinition`] and
//!   [`Migrator`]: DDL generation and versioned migrations recorded in a
//!   `schema_migrations` ledger.
//!
//! The SQL engine sits behind the [`Storage`] trait; the
//! `litemodel-sqlite` crate provides the SQLite implementation.
//!
//! # Example
//!
//! ```ignore
//! use litemodel_core::*;
//!
//! let store = Store::new(storage);
//! Migrator::new(&store, vec![
//!     MigrationDefinition::new(1, None)
//!         .create_table(TableDefinition::new("events").text("name").timestamps()),
//! ])?
//! .run()?;
//!
//! let event: Event = store.create(Attributes::new().with("name", "launched"))?;
//! let found = store.query::<Event>().filter(Attributes::new().with("name", "launched")).first()?;
//! ```

mod column;
mod error;
mod migrator;
mod query;
mod record;
mod schema;
mod scope;
mod serializer;
mod storage;
mod store;
mod value;

#[cfg(test)]
mod testing;

pub use column::{ColumnDefinition, ColumnType};
pub use error::{ModelError, Result, validate_identifier};
pub use migrator::{LEDGER_TABLE, MigrationStatus, Migrator, SchemaMigration, ledger_table};
pub use query::Query;
pub use record::{BoundColumn, ModelBuilder, Record, RecordDescriptor, RecordState, TIMESTAMP_COLUMNS, default_table_name};
pub use schema::{IndexDefinition, MigrationDefinition, SchemaChange, TableDefinition};
pub use scope::Scope;
pub use serializer::{AttributeSerializer, Serializer, date_from_iso8601, time_from_iso8601, time_to_iso8601};
pub use storage::{Calculation, Row, Storage};
pub use store::Store;
pub use value::{Attributes, FromValue, Value};
