//! The SQLite [`Storage`] implementation.
//!
//! Table and column names are validated as identifiers before they are
//! written into SQL. Every value travels as a bound parameter. The only
//! text passed through verbatim is a scope's ordering term.

use std::path::Path;

use litemodel_core::{Attributes, Calculation, ModelError, Row, Scope, Storage, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::config::{DatabaseLocation, StoreConfig};
use crate::convert;
use crate::error::{Result, SqliteError, validate_identifier};

/// A single SQLite connection used as record storage.
///
/// # Examples
///
/// ```
/// use litemodel_core::{Storage, TableDefinition};
/// use litemodel_sqlite::SqliteStorage;
///
/// let storage = SqliteStorage::open_in_memory().unwrap();
/// TableDefinition::new("events").text("name").execute(&storage).unwrap();
/// assert!(storage.table_exists("events").unwrap());
/// ```
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    debug: bool,
}

impl SqliteStorage {
    /// Opens the database named by `config`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ConfigError`] for an empty file path and
    /// [`SqliteError::DatabaseError`] if SQLite cannot open the file.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let conn = match &config.file {
            DatabaseLocation::File(path) if path.as_os_str().is_empty() => {
                return Err(SqliteError::ConfigError("database file path is empty".to_string()));
            }
            DatabaseLocation::Memory => Connection::open_in_memory()?,
            DatabaseLocation::File(path) => Connection::open(path)?,
        };
        Ok(Self::from_connection(conn, config.debug))
    }

    /// Opens the database file at `path` with statement logging on.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?, true))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?, true))
    }

    /// Wraps an existing connection. With `debug` on, every statement is
    /// logged with its parameters.
    pub fn from_connection(conn: Connection, debug: bool) -> Self {
        Self { conn, debug }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Releases the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn log(&self, sql: &str, params: &[SqlValue]) {
        if self.debug {
            debug!(%sql, ?params, "sqlite statement");
        }
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.log(sql, params);
        let mut stmt = self.conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            stmt.execute(params_from_iter(params))?;
            return Ok(Vec::new());
        }
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(convert::row_to_attributes(row, &columns)?);
        }
        Ok(out)
    }

    fn run(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        self.log(sql, params);
        Ok(self.conn.execute(sql, params_from_iter(params))?)
    }

    fn validate_scope(&self, scope: &Scope) -> Result<()> {
        validate_identifier(scope.table())?;
        for column in scope.conditions().names() {
            validate_identifier(column)?;
        }
        Ok(())
    }

    fn insert_row(&self, table: &str, params: &Attributes) -> Result<i64> {
        validate_identifier(table)?;
        let sql = if params.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            let mut columns = Vec::with_capacity(params.len());
            for name in params.names() {
                validate_identifier(name)?;
                columns.push(name);
            }
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!("INSERT INTO {table} ({}) VALUES ({placeholders})", columns.join(", "))
        };
        self.run(&sql, &convert::to_sql_all(params.values()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_rows(&self, scope: &Scope, params: &Attributes) -> Result<usize> {
        self.validate_scope(scope)?;
        if params.is_empty() {
            return Ok(0);
        }
        let mut assignments = Vec::with_capacity(params.len());
        for name in params.names() {
            validate_identifier(name)?;
            assignments.push(format!("{name} = ?"));
        }
        let sql = scope.statement(&format!("UPDATE {} SET {}", scope.table(), assignments.join(", ")));
        let values = convert::to_sql_all(params.values().chain(scope.conditions().values()));
        self.run(&sql, &values)
    }

    fn calculate_value(&self, scope: &Scope, calculation: Calculation, column: Option<&str>) -> Result<Option<Value>> {
        self.validate_scope(scope)?;
        if let Some(column) = column {
            validate_identifier(column)?;
        }
        let name = calculation.name();
        let sql = scope.statement(&format!(
            "SELECT {} AS {name} FROM {}",
            calculation.sql(column),
            scope.table()
        ));
        let mut rows = self.query(&sql, &convert::to_sql_all(scope.conditions().values()))?;
        let value = rows.pop().and_then(|mut row| row.remove(name));
        Ok(value.filter(|v| !v.is_null()))
    }
}

impl Storage for SqliteStorage {
    fn execute(&self, sql: &str) -> litemodel_core::Result<Vec<Row>> {
        Ok(self.query(sql, &[])?)
    }

    fn select(&self, scope: &Scope) -> litemodel_core::Result<Vec<Row>> {
        self.validate_scope(scope)?;
        let sql = scope.statement(&format!("SELECT * FROM {}", scope.table()));
        Ok(self.query(&sql, &convert::to_sql_all(scope.conditions().values()))?)
    }

    fn insert(&self, table: &str, params: &Attributes) -> litemodel_core::Result<i64> {
        Ok(self.insert_row(table, params)?)
    }

    fn update(&self, scope: &Scope, params: &Attributes) -> litemodel_core::Result<usize> {
        Ok(self.update_rows(scope, params)?)
    }

    fn delete(&self, scope: &Scope) -> litemodel_core::Result<usize> {
        self.validate_scope(scope)?;
        let sql = scope.statement(&format!("DELETE FROM {}", scope.table()));
        Ok(self.run(&sql, &convert::to_sql_all(scope.conditions().values()))?)
    }

    fn calculate(
        &self,
        scope: &Scope,
        calculation: Calculation,
        column: Option<&str>,
    ) -> litemodel_core::Result<Option<Value>> {
        Ok(self.calculate_value(scope, calculation, column)?)
    }

    fn table_exists(&self, name: &str) -> litemodel_core::Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .map_err(ModelError::storage)?;
        Ok(count > 0)
    }

    /// Runs `work` inside a SQLite transaction, committing on success and
    /// rolling back on error.
    fn atomically(&self, work: &mut dyn FnMut() -> litemodel_core::Result<()>) -> litemodel_core::Result<()> {
        let tx = self.conn.unchecked_transaction().map_err(ModelError::storage)?;
        work()?;
        tx.commit().map_err(ModelError::storage)
    }
}
