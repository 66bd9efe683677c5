//! The storage connection boundary.
//!
//! [`Storage`] is everything the record layer needs from an SQL engine:
//! raw statement execution for DDL and introspection, scoped reads and
//! writes with bound parameters, aggregate calculations, and table lookup.
//! Implementations bind the [`Scope`] predicate values positionally in the
//! order returned by [`Scope::predicate_values`].

use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};
use crate::scope::Scope;
use crate::value::{Attributes, Value};

/// A result row: column name to storage-native value.
pub type Row = Attributes;

/// Aggregate functions supported by [`Storage::calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calculation {
    Count,
    Maximum,
    Minimum,
    Sum,
    Average,
}

impl Calculation {
    pub fn name(self) -> &'static str {
        match self {
            Calculation::Count => "count",
            Calculation::Maximum => "maximum",
            Calculation::Minimum => "minimum",
            Calculation::Sum => "sum",
            Calculation::Average => "average",
        }
    }

    /// Renders the aggregate expression. `COUNT` without a column counts rows.
    pub fn sql(self, column: Option<&str>) -> String {
        let column = column.unwrap_or("*");
        match self {
            Calculation::Count => format!("COUNT({column})"),
            Calculation::Maximum => format!("MAX({column})"),
            Calculation::Minimum => format!("MIN({column})"),
            Calculation::Sum => format!("SUM({column})"),
            Calculation::Average => format!("AVG({column})"),
        }
    }
}

impl fmt::Display for Calculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Calculation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "count" => Ok(Calculation::Count),
            "maximum" => Ok(Calculation::Maximum),
            "minimum" => Ok(Calculation::Minimum),
            "sum" => Ok(Calculation::Sum),
            "average" => Ok(Calculation::Average),
            other => Err(ModelError::UnknownCalculation(other.to_string())),
        }
    }
}

/// A single-writer SQL storage connection.
pub trait Storage {
    /// Executes a raw statement and returns any result rows.
    fn execute(&self, sql: &str) -> Result<Vec<Row>>;

    /// Returns every row in `scope`.
    fn select(&self, scope: &Scope) -> Result<Vec<Row>>;

    /// Inserts one row and returns the row id assigned by the store.
    fn insert(&self, table: &str, params: &Attributes) -> Result<i64>;

    /// Updates every row in `scope` and returns the number of rows changed.
    fn update(&self, scope: &Scope, params: &Attributes) -> Result<usize>;

    /// Deletes every row in `scope` and returns the number of rows removed.
    fn delete(&self, scope: &Scope) -> Result<usize>;

    /// Runs one aggregate over `scope`; `None` when the aggregate is `NULL`.
    fn calculate(&self, scope: &Scope, calculation: Calculation, column: Option<&str>) -> Result<Option<Value>>;

    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Runs `work` as one atomic unit where the store supports it.
    ///
    /// The default runs `work` directly with no rollback on failure.
    fn atomically(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        work()
    }
}
