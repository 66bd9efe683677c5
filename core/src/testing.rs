//! In-memory storage that records every call, for unit tests.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::column::ColumnDefinition;
use crate::error::{ModelError, Result};
use crate::scope::Scope;
use crate::storage::{Calculation, Row, Storage};
use crate::value::{Attributes, Value};

/// A write issued against the storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Insert {
        table: String,
        params: Attributes,
    },
    Update {
        table: String,
        predicate: String,
        values: Vec<Value>,
        params: Attributes,
    },
    Delete {
        table: String,
        predicate: String,
        values: Vec<Value>,
    },
}

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnDefinition>,
    rows: Vec<Row>,
    last_id: i64,
}

#[derive(Debug, Default)]
pub struct RecordingStorage {
    tables: RefCell<BTreeMap<String, Table>>,
    executed: RefCell<Vec<String>>,
    reads: RefCell<Vec<String>>,
    writes: RefCell<Vec<Call>>,
    introspections: RefCell<HashMap<String, usize>>,
    failures: RefCell<Vec<String>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_table(&self, name: &str, columns: Vec<ColumnDefinition>) {
        self.tables.borrow_mut().insert(
            name.to_string(),
            Table {
                columns,
                ..Table::default()
            },
        );
    }

    /// Makes any executed statement containing `fragment` fail.
    pub fn fail_on(&self, fragment: &str) {
        self.failures.borrow_mut().push(fragment.to_string());
    }

    /// Executed statements, excluding introspection.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Predicates of every select, in call order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.borrow().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.writes.borrow().clone()
    }

    pub fn introspections(&self, table: &str) -> usize {
        self.introspections.borrow().get(table).copied().unwrap_or(0)
    }

    fn pragma(&self, table: &str) -> Vec<Row> {
        *self
            .introspections
            .borrow_mut()
            .entry(table.to_string())
            .or_default() += 1;
        let tables = self.tables.borrow();
        let Some(table) = tables.get(table) else {
            return Vec::new();
        };
        table
            .columns
            .iter()
            .enumerate()
            .map(|(cid, column)| {
                Attributes::new()
                    .with("cid", cid as i64)
                    .with("name", column.name())
                    .with("type", column.column_type().sql_type())
                    .with("notnull", i64::from(!column.is_nullable()))
                    .with("dflt_value", column.default_value().map(Value::to_sql_literal))
                    .with("pk", i64::from(column.is_primary()))
            })
            .collect()
    }

    fn create_table(&self, sql: &str) -> Result<()> {
        let rest = sql.trim_start_matches("CREATE TABLE ");
        let (name, body) = rest
            .split_once(" (")
            .ok_or_else(|| ModelError::storage(format!("malformed statement: {sql}")))?;
        let body = body.strip_suffix(')').unwrap_or(body);

        let mut columns = Vec::new();
        for definition in body.split(", ") {
            let mut words = definition.split_whitespace();
            let column = words.next().unwrap_or_default();
            let sql_type = words.next().unwrap_or_default();
            let default = definition
                .split_once(" DEFAULT ")
                .map(|(_, literal)| literal.to_string());
            let row = Attributes::new()
                .with("name", column)
                .with("type", sql_type)
                .with("notnull", i64::from(definition.contains("NOT NULL")))
                .with("dflt_value", default)
                .with("pk", i64::from(definition.contains("PRIMARY KEY")));
            columns.push(ColumnDefinition::from_pragma(&row)?);
        }

        if self.tables.borrow().contains_key(name) {
            return Err(ModelError::storage(format!("table {name} already exists")));
        }
        self.define_table(name, columns);
        Ok(())
    }

    fn matching(&self, table: &Table, scope: &Scope) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..table.rows.len())
            .filter(|&i| {
                scope
                    .conditions()
                    .iter()
                    .all(|(column, expected)| table.rows[i].get(column).unwrap_or(&Value::Null) == expected)
            })
            .collect();

        if let Some(term) = scope.ordering() {
            let mut words = term.split_whitespace();
            let column = words.next().unwrap_or_default();
            let descending = words.next().is_some_and(|w| w.eq_ignore_ascii_case("desc"));
            indices.sort_by(|&a, &b| {
                let ordering = compare(
                    table.rows[a].get(column).unwrap_or(&Value::Null),
                    table.rows[b].get(column).unwrap_or(&Value::Null),
                );
                if descending { ordering.reverse() } else { ordering }
            });
        }
        if let Some(limit) = scope.limit_value() {
            indices.truncate(limit as usize);
        }
        indices
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        _ => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
    }
}

fn missing(table: &str) -> ModelError {
    ModelError::storage(format!("no such table: {table}"))
}

impl Storage for RecordingStorage {
    fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        if let Some(table) = sql
            .strip_prefix("PRAGMA table_info(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(self.pragma(table));
        }
        if self.failures.borrow().iter().any(|fragment| sql.contains(fragment.as_str())) {
            return Err(ModelError::storage(format!("forced failure: {sql}")));
        }
        self.executed.borrow_mut().push(sql.to_string());
        if sql.starts_with("CREATE TABLE ") {
            self.create_table(sql)?;
        }
        Ok(Vec::new())
    }

    fn select(&self, scope: &Scope) -> Result<Vec<Row>> {
        self.reads.borrow_mut().push(scope.predicate().to_string());
        let tables = self.tables.borrow();
        let table = tables.get(scope.table()).ok_or_else(|| missing(scope.table()))?;
        Ok(self
            .matching(table, scope)
            .into_iter()
            .map(|i| table.rows[i].clone())
            .collect())
    }

    fn insert(&self, name: &str, params: &Attributes) -> Result<i64> {
        self.writes.borrow_mut().push(Call::Insert {
            table: name.to_string(),
            params: params.clone(),
        });
        let mut tables = self.tables.borrow_mut();
        let table = tables.get_mut(name).ok_or_else(|| missing(name))?;
        if let Some(unknown) = params
            .names()
            .find(|param| !table.columns.iter().any(|c| c.name() == *param))
        {
            return Err(ModelError::storage(format!("no such column: {unknown}")));
        }

        table.last_id += 1;
        let id = table.last_id;
        let row = table
            .columns
            .iter()
            .map(|column| {
                let value = if column.is_primary() {
                    Value::Integer(id)
                } else {
                    params
                        .get(column.name())
                        .or(column.default_value())
                        .cloned()
                        .unwrap_or_default()
                };
                (column.name().to_string(), value)
            })
            .collect();
        table.rows.push(row);
        Ok(id)
    }

    fn update(&self, scope: &Scope, params: &Attributes) -> Result<usize> {
        self.writes.borrow_mut().push(Call::Update {
            table: scope.table().to_string(),
            predicate: scope.predicate().to_string(),
            values: scope.predicate_values(),
            params: params.clone(),
        });
        let mut tables = self.tables.borrow_mut();
        let table = tables.get_mut(scope.table()).ok_or_else(|| missing(scope.table()))?;
        let indices = self.matching(table, scope);
        for &i in &indices {
            for (column, value) in params.iter() {
                table.rows[i].set(column, value.clone());
            }
        }
        Ok(indices.len())
    }

    fn delete(&self, scope: &Scope) -> Result<usize> {
        self.writes.borrow_mut().push(Call::Delete {
            table: scope.table().to_string(),
            predicate: scope.predicate().to_string(),
            values: scope.predicate_values(),
        });
        let mut tables = self.tables.borrow_mut();
        let table = tables.get_mut(scope.table()).ok_or_else(|| missing(scope.table()))?;
        let mut indices = self.matching(table, scope);
        indices.sort_unstable();
        for &i in indices.iter().rev() {
            table.rows.remove(i);
        }
        Ok(indices.len())
    }

    fn calculate(&self, scope: &Scope, calculation: Calculation, column: Option<&str>) -> Result<Option<Value>> {
        let tables = self.tables.borrow();
        let table = tables.get(scope.table()).ok_or_else(|| missing(scope.table()))?;
        let rows = self.matching(table, scope);

        let Some(column) = column else {
            return Ok(Some(Value::Integer(rows.len() as i64)));
        };
        let values: Vec<&Value> = rows
            .iter()
            .filter_map(|&i| table.rows[i].get(column))
            .filter(|v| !v.is_null())
            .collect();

        let result = match calculation {
            Calculation::Count => Some(Value::Integer(values.len() as i64)),
            _ if values.is_empty() => None,
            Calculation::Sum if values.iter().all(|v| v.as_i64().is_some()) => {
                Some(Value::Integer(values.iter().filter_map(|v| v.as_i64()).sum()))
            }
            Calculation::Sum => Some(Value::Float(values.iter().filter_map(|v| v.as_f64()).sum())),
            Calculation::Average => {
                let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
                Some(Value::Float(total / values.len() as f64))
            }
            Calculation::Minimum => values.iter().copied().min_by(|a, b| compare(a, b)).cloned(),
            Calculation::Maximum => values.iter().copied().max_by(|a, b| compare(a, b)).cloned(),
        };
        Ok(result)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables.borrow().contains_key(name))
    }

    fn atomically(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let snapshot = self.tables.borrow().clone();
        let result = work();
        if result.is_err() {
            *self.tables.borrow_mut() = snapshot;
        }
        result
    }
}
