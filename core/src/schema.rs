//! Table, index and migration definitions.
//!
//! Definitions are plain values that render to DDL. Nothing touches storage
//! until [`MigrationDefinition::execute`] (or the [`Migrator`](crate::Migrator))
//! runs the rendered statements.
//!
//! # Example
//!
//! ```
//! use litemodel_core::{ColumnDefinition, ColumnType, MigrationDefinition, TableDefinition};
//!
//! let migration = MigrationDefinition::new(1, None).create_table(
//!     TableDefinition::new("events")
//!         .column(ColumnDefinition::new(ColumnType::Text, "name").not_null())
//!         .timestamps()
//!         .index(&["name"], true),
//! );
//!
//! assert_eq!(migration.name(), "Migration #1");
//! assert_eq!(
//!     migration.statements().unwrap(),
//!     vec![
//!         "CREATE TABLE events (id INTEGER PRIMARY KEY ASC AUTOINCREMENT, name TEXT NOT NULL, \
//!          created_at INTEGER, updated_at INTEGER)"
//!             .to_string(),
//!         "CREATE UNIQUE INDEX index_events_on_name ON events (name)".to_string(),
//!     ]
//! );
//! ```

use tracing::debug;

use crate::column::{ColumnDefinition, ColumnType};
use crate::error::{ModelError, Result, validate_identifier};
use crate::storage::Storage;

/// A single- or multi-column index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    table: String,
    columns: Vec<String>,
    unique: bool,
    name: Option<String>,
}

impl IndexDefinition {
    pub fn new<C: AsRef<str>>(table: impl Into<String>, columns: &[C]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            unique: false,
            name: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Overrides the generated index name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// The explicit name, or `index_<table>_on_<c1>_and_<c2>...`.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("index_{}_on_{}", self.table, self.columns.join("_and_")),
        }
    }

    /// Renders the `CREATE INDEX` statement.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidIdentifier`] if the table, index or any
    /// column name is not a plain identifier, or if the index has no columns.
    pub fn to_sql(&self) -> Result<String> {
        let name = self.name();
        validate_identifier(&self.table)?;
        validate_identifier(&name)?;
        if self.columns.is_empty() {
            return Err(ModelError::InvalidIdentifier(String::new()));
        }
        for column in &self.columns {
            validate_identifier(column)?;
        }
        let unique = if self.unique { "UNIQUE " } else { "" };
        Ok(format!(
            "CREATE {unique}INDEX {name} ON {} ({})",
            self.table,
            self.columns.join(", ")
        ))
    }
}

/// A table with its columns and indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    name: String,
    primary_key: Option<String>,
    columns: Vec<ColumnDefinition>,
    indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    /// Creates a table with an auto-increment `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Some("id".to_string()),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn without_primary_key(mut self) -> Self {
        self.primary_key = None;
        self
    }

    /// Renames the auto-increment primary key column.
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = Some(name.into());
        self
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn integer(self, name: impl Into<String>) -> Self {
        self.column(ColumnDefinition::new(ColumnType::Integer, name))
    }

    pub fn text(self, name: impl Into<String>) -> Self {
        self.column(ColumnDefinition::new(ColumnType::Text, name))
    }

    pub fn float(self, name: impl Into<String>) -> Self {
        self.column(ColumnDefinition::new(ColumnType::Float, name))
    }

    /// Adds integer `created_at` and `updated_at` columns.
    pub fn timestamps(self) -> Self {
        self.integer("created_at").integer("updated_at")
    }

    pub fn index<C: AsRef<str>>(self, columns: &[C], unique: bool) -> Self {
        let index = IndexDefinition::new(self.name.clone(), columns);
        self.add_index(if unique { index.unique() } else { index })
    }

    pub fn add_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every column in table order, primary key first.
    pub fn columns(&self) -> Vec<ColumnDefinition> {
        let primary = self
            .primary_key
            .as_ref()
            .map(|pk| ColumnDefinition::new(ColumnType::Integer, pk.clone()).primary());
        primary.into_iter().chain(self.columns.iter().cloned()).collect()
    }

    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    /// Renders `CREATE TABLE` followed by one statement per index.
    pub fn statements(&self) -> Result<Vec<String>> {
        validate_identifier(&self.name)?;
        let columns = self.columns();
        for column in &columns {
            validate_identifier(column.name())?;
        }
        let definitions: Vec<String> = columns.iter().map(ColumnDefinition::to_sql_definition).collect();

        let mut statements = vec![format!("CREATE TABLE {} ({})", self.name, definitions.join(", "))];
        for index in &self.indexes {
            statements.push(index.to_sql()?);
        }
        Ok(statements)
    }

    pub fn execute(&self, storage: &dyn Storage) -> Result<()> {
        execute_all(storage, &self.statements()?)
    }
}

/// One step of a migration.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateTable(TableDefinition),
    AddIndex(IndexDefinition),
}

impl SchemaChange {
    pub fn statements(&self) -> Result<Vec<String>> {
        match self {
            SchemaChange::CreateTable(table) => table.statements(),
            SchemaChange::AddIndex(index) => Ok(vec![index.to_sql()?]),
        }
    }
}

/// A versioned, ordered list of schema changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationDefinition {
    version: i64,
    name: String,
    changes: Vec<SchemaChange>,
}

impl MigrationDefinition {
    /// Creates an empty migration; the name defaults to `Migration #<version>`.
    pub fn new(version: i64, name: Option<&str>) -> Self {
        Self {
            version,
            name: name.map_or_else(|| format!("Migration #{version}"), str::to_string),
            changes: Vec::new(),
        }
    }

    pub fn create_table(mut self, table: TableDefinition) -> Self {
        self.changes.push(SchemaChange::CreateTable(table));
        self
    }

    pub fn add_index(mut self, index: IndexDefinition) -> Self {
        self.changes.push(SchemaChange::AddIndex(index));
        self
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn changes(&self) -> &[SchemaChange] {
        &self.changes
    }

    /// Every statement of the migration in declaration order.
    pub fn statements(&self) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for change in &self.changes {
            statements.extend(change.statements()?);
        }
        Ok(statements)
    }

    /// Executes every statement in declaration order, stopping at the first
    /// failure.
    pub fn execute(&self, storage: &dyn Storage) -> Result<()> {
        execute_all(storage, &self.statements()?)
    }
}

fn execute_all(storage: &dyn Storage, statements: &[String]) -> Result<()> {
    for sql in statements {
        debug!(%sql, "executing schema statement");
        storage.execute(sql)?;
    }
    Ok(())
}
