//! Column definitions.
//!
//! A [`ColumnDefinition`] describes one table column: its semantic
//! [`ColumnType`], its name and its constraints. Definitions render to the
//! column clause of a `CREATE TABLE` statement and can be rebuilt from a
//! `PRAGMA table_info` row when a record type introspects its table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::{Attributes, Value};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Text,
    Float,
}

impl ColumnType {
    /// Storage-native type name used in DDL.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Float => "REAL",
        }
    }

    /// Maps a storage-reported type name back to its semantic type.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownColumnType`] for any type other than
    /// `INTEGER`, `TEXT` or `REAL`.
    pub fn from_sql_type(sql_type: &str) -> Result<Self> {
        match sql_type.trim().to_ascii_uppercase().as_str() {
            "INTEGER" => Ok(ColumnType::Integer),
            "TEXT" => Ok(ColumnType::Text),
            "REAL" => Ok(ColumnType::Float),
            _ => Err(ModelError::UnknownColumnType(sql_type.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Text => "text",
            ColumnType::Float => "float",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "integer" => Ok(ColumnType::Integer),
            "text" => Ok(ColumnType::Text),
            "float" => Ok(ColumnType::Float),
            other => Err(ModelError::UnknownColumnType(other.to_string())),
        }
    }
}

/// One table column with its constraints.
///
/// # Examples
///
/// ```
/// use litemodel_core::{ColumnDefinition, ColumnType};
///
/// let id = ColumnDefinition::new(ColumnType::Integer, "id").primary();
/// assert_eq!(id.to_sql_definition(), "id INTEGER PRIMARY KEY ASC AUTOINCREMENT");
///
/// let name = ColumnDefinition::new(ColumnType::Text, "name").not_null().default("x");
/// assert_eq!(name.to_sql_definition(), "name TEXT NOT NULL DEFAULT 'x'");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    column_type: ColumnType,
    name: String,
    primary: bool,
    nullable: bool,
    default: Option<Value>,
}

impl ColumnDefinition {
    /// Creates a nullable column with no default.
    pub fn new(column_type: ColumnType, name: impl Into<String>) -> Self {
        Self {
            column_type,
            name: name.into(),
            primary: false,
            nullable: true,
            default: None,
        }
    }

    /// Creates a column from a type name such as `"integer"`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownColumnType`] for unsupported type names.
    pub fn parse(column_type: &str, name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(column_type.parse()?, name))
    }

    /// Marks the column as the auto-incrementing primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default = (!value.is_null()).then_some(value);
        self
    }

    /// Applies a named option: `primary` (bool), `null` (bool) or `default`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownColumnOption`] for any other key.
    pub fn with_option(self, key: &str, value: Value) -> Result<Self> {
        let truthy = match &value {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            _ => true,
        };
        match key {
            "primary" => Ok(if truthy { self.primary() } else { self }),
            "null" => Ok(self.nullable(truthy)),
            "default" => Ok(self.default(value)),
            other => Err(ModelError::UnknownColumnOption(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Renders the column clause of a `CREATE TABLE` statement.
    pub fn to_sql_definition(&self) -> String {
        let mut parts = vec![self.name.clone(), self.column_type.sql_type().to_string()];
        if self.primary {
            parts.push("PRIMARY KEY ASC AUTOINCREMENT".to_string());
        }
        if !self.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {}", default.to_sql_literal()));
        }
        parts.join(" ")
    }

    /// Rebuilds a column from a `PRAGMA table_info` row.
    ///
    /// The row carries `name`, `type`, `notnull`, `dflt_value` and `pk`.
    /// Defaults are coerced to the column's semantic type: numeric defaults
    /// are parsed and text defaults lose their surrounding quotes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownColumnType`] for unsupported storage
    /// types and [`ModelError::Parse`] for unparseable numeric defaults.
    pub fn from_pragma(row: &Attributes) -> Result<Self> {
        let name: String = row.value("name")?;
        let sql_type: String = row.value("type")?;
        let column_type = ColumnType::from_sql_type(&sql_type)?;
        let not_null = row.value::<Option<i64>>("notnull")?.unwrap_or(0) == 1;
        let primary = row.value::<Option<i64>>("pk")?.unwrap_or(0) == 1;

        let default = match row.get("dflt_value") {
            None | Some(Value::Null) => None,
            Some(Value::Text(raw)) => Some(parse_default(column_type, raw)?),
            Some(other) => Some(other.clone()),
        };

        Ok(Self {
            column_type,
            name,
            primary,
            nullable: !not_null,
            default,
        })
    }
}

fn parse_default(column_type: ColumnType, raw: &str) -> Result<Value> {
    let raw = raw.trim();
    match column_type {
        ColumnType::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| ModelError::Parse(raw.to_string())),
        ColumnType::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ModelError::Parse(raw.to_string())),
        ColumnType::Text => {
            let unquoted = raw
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .map(|s| s.replace("''", "'"))
                .unwrap_or_else(|| raw.to_string());
            Ok(Value::Text(unquoted))
        }
    }
}
