//! Conversions between attribute values and SQLite values.

use litemodel_core::{Attributes, Value};
use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::error::{Result, SqliteError};

/// Converts an attribute value into a bindable SQLite value.
///
/// Booleans bind as `0`/`1`, timestamps as RFC 3339 text and JSON as its
/// text encoding.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
        Value::Json(json) => SqlValue::Text(json.to_string()),
    }
}

pub(crate) fn to_sql_all<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<SqlValue> {
    values.into_iter().map(to_sql).collect()
}

/// Converts a column of a result row into a storage-native value.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] for `BLOB` columns.
pub(crate) fn from_sql(value: ValueRef<'_>, column: &str) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|_| SqliteError::ConversionError(format!("column {column} holds invalid UTF-8 text"))),
        ValueRef::Blob(_) => Err(SqliteError::ConversionError(format!("column {column} holds a BLOB"))),
    }
}

/// Reads every column of `row` into an attribute map, in column order.
pub(crate) fn row_to_attributes(row: &Row<'_>, columns: &[String]) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    for (i, name) in columns.iter().enumerate() {
        attrs.set(name.as_str(), from_sql(row.get_ref(i)?, name)?);
    }
    Ok(attrs)
}
