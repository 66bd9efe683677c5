//! Declarative migration plans.
//!
//! # Example YAML
//!
//! ```yaml
//! migrations:
//!   - version: 1
//!     name: Create events table
//!     changes:
//!       - create_table:
//!           name: events
//!           timestamps: true
//!           columns:
//!             - { name: name, type: text, options: { null: false } }
//!             - { name: score, type: integer, options: { default: 0 } }
//!           indexes:
//!             - { columns: [name], unique: true }
//!   - version: 2
//!     changes:
//!       - add_index: { table: events, columns: [score] }
//! ```

use std::io::BufReader;
use std::path::Path;

use litemodel_core::{ColumnDefinition, IndexDefinition, MigrationDefinition, ModelError, TableDefinition, Value};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid plan: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("migration {version}: {source}")]
    Definition {
        version: i64,
        #[source]
        source: ModelError,
    },

    #[error("migration {0}: each change needs exactly one of create_table or add_index")]
    AmbiguousChange(i64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationPlan {
    #[serde(default)]
    pub migrations: Vec<PlannedMigration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedMigration {
    pub version: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub changes: Vec<PlannedChange>,
}

/// One change; exactly one field is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedChange {
    #[serde(default)]
    pub create_table: Option<PlannedTable>,
    #[serde(default)]
    pub add_index: Option<PlannedIndex>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedTable {
    pub name: String,
    /// Adds the auto-increment primary key.
    #[serde(default = "default_true")]
    pub id: bool,
    /// Renames the primary key column.
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub columns: Vec<PlannedColumn>,
    #[serde(default)]
    pub indexes: Vec<PlannedTableIndex>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    /// `primary`, `null` and `default`.
    #[serde(default)]
    pub options: serde_yaml::Mapping,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedTableIndex {
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedIndex {
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Option keys as written; a bare `null` key reads as YAML null.
fn option_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}

impl MigrationPlan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PlanError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Builds migration definitions, checking column types and options.
    pub fn into_definitions(self) -> Result<Vec<MigrationDefinition>, PlanError> {
        self.migrations.into_iter().map(PlannedMigration::into_definition).collect()
    }
}

impl PlannedMigration {
    fn into_definition(self) -> Result<MigrationDefinition, PlanError> {
        let version = self.version;
        let wrap = |source| PlanError::Definition { version, source };

        let mut migration = MigrationDefinition::new(version, self.name.as_deref());
        for change in self.changes {
            migration = match (change.create_table, change.add_index) {
                (Some(table), None) => migration.create_table(table.into_definition().map_err(wrap)?),
                (None, Some(index)) => migration.add_index(index.into_definition()),
                _ => return Err(PlanError::AmbiguousChange(version)),
            };
        }
        Ok(migration)
    }
}

impl PlannedTable {
    fn into_definition(self) -> Result<TableDefinition, ModelError> {
        let mut table = TableDefinition::new(self.name.clone());
        if !self.id {
            table = table.without_primary_key();
        } else if let Some(pk) = self.primary_key {
            table = table.primary_key(pk);
        }
        for planned in self.columns {
            let mut column = ColumnDefinition::parse(&planned.column_type, planned.name)?;
            for (key, value) in &planned.options {
                column = column.with_option(&option_key(key), Value::from_json(serde_json::to_value(value)?))?;
            }
            table = table.column(column);
        }
        if self.timestamps {
            table = table.timestamps();
        }
        for planned in self.indexes {
            let mut index = IndexDefinition::new(self.name.clone(), planned.columns.as_slice());
            if planned.unique {
                index = index.unique();
            }
            if let Some(name) = planned.name {
                index = index.named(name);
            }
            table = table.add_index(index);
        }
        Ok(table)
    }
}

impl PlannedIndex {
    fn into_definition(self) -> IndexDefinition {
        let mut index = IndexDefinition::new(self.table, self.columns.as_slice());
        if self.unique {
            index = index.unique();
        }
        match self.name {
            Some(name) => index.named(name),
            None => index,
        }
    }
}
