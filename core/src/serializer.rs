//! Attribute serializers.
//!
//! A [`Serializer`] converts one attribute between its in-memory [`Value`]
//! and the storage-native value written to its column. Each serializer
//! checks the column's declared [`ColumnType`] at use time and refuses
//! columns it cannot represent itself in.
//!
//! | Serializer | Columns | Storage form |
//! |------------|---------|--------------|
//! | `Default` | any | value as-is |
//! | `Boolean` | integer | `1` / `0` |
//! | `Time` | integer, float, text | epoch seconds or ISO-8601 text |
//! | `Date` | text | `YYYY-MM-DD` |
//! | `Json` | text | JSON text |

use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use regex::Regex;

use crate::column::{ColumnDefinition, ColumnType};
use crate::error::{ModelError, Result};
use crate::value::Value;

static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(-?[0-9]+)-([0-9]{2})-([0-9]{2})T([0-9]{2}):([0-9]{2}):([0-9]{2})(\.[0-9]+)?(?:(Z)|([+-])([0-9]{2}):([0-9]{2}))?\s*$",
    )
        .expect("static regex must compile")
});

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?[0-9]+)-([0-9]{2})-([0-9]{2})\s*$").expect("static regex must compile")
});

/// A user-supplied serializer for attributes the built-ins do not cover.
pub trait AttributeSerializer: fmt::Debug + Send + Sync {
    /// Converts an in-memory value into its storage-native form.
    fn serialize(&self, column: &ColumnDefinition, value: Value) -> Result<Value>;

    /// Converts a storage-native value back into its in-memory form.
    fn deserialize(&self, column: &ColumnDefinition, value: Value) -> Result<Value>;
}

/// Serialization strategy for one attribute.
///
/// # Examples
///
/// ```
/// use litemodel_core::{ColumnDefinition, ColumnType, Serializer, Value};
///
/// let column = ColumnDefinition::new(ColumnType::Integer, "done");
/// let stored = Serializer::Boolean.serialize(&column, Value::Boolean(true)).unwrap();
/// assert_eq!(stored, Value::Integer(1));
///
/// assert!(Serializer::from_tag("yaml").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub enum Serializer {
    /// Identity in both directions.
    #[default]
    Default,
    Boolean,
    /// Timestamp with full precision.
    Time,
    /// Calendar date, stored without time of day.
    Date,
    Json,
    Custom(Arc<dyn AttributeSerializer>),
}

impl Serializer {
    /// Selects a built-in serializer by tag.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownSerializer`] for tags other than
    /// `time`, `boolean`, `json` and `date`.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "time" => Ok(Serializer::Time),
            "boolean" => Ok(Serializer::Boolean),
            "json" => Ok(Serializer::Json),
            "date" => Ok(Serializer::Date),
            other => Err(ModelError::UnknownSerializer(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Serializer::Default => "default",
            Serializer::Boolean => "boolean",
            Serializer::Time => "time",
            Serializer::Date => "date",
            Serializer::Json => "json",
            Serializer::Custom(_) => "custom",
        }
    }

    /// Converts an in-memory value into the storage-native value for `column`.
    pub fn serialize(&self, column: &ColumnDefinition, value: Value) -> Result<Value> {
        match self {
            Serializer::Default => Ok(value),
            Serializer::Boolean => {
                self.require(column, &[ColumnType::Integer])?;
                let flag = match value {
                    Value::Null => false,
                    Value::Boolean(b) => b,
                    Value::Integer(i) => i != 0,
                    other => return Err(self.mismatch(&other)),
                };
                Ok(Value::Integer(i64::from(flag)))
            }
            Serializer::Time => {
                self.require(column, &[ColumnType::Integer, ColumnType::Float, ColumnType::Text])?;
                let time = match value {
                    Value::Null => return Ok(Value::Null),
                    Value::Timestamp(ts) => ts,
                    other => return Err(self.mismatch(&other)),
                };
                Ok(match column.column_type() {
                    ColumnType::Integer => Value::Integer(time.timestamp()),
                    ColumnType::Float => Value::Float(
                        time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1_000_000.0,
                    ),
                    ColumnType::Text => Value::Text(time_to_iso8601(&time)),
                })
            }
            Serializer::Date => {
                self.require(column, &[ColumnType::Text])?;
                match value {
                    Value::Null => Ok(Value::Null),
                    Value::Timestamp(ts) => Ok(Value::Text(ts.format("%Y-%m-%d").to_string())),
                    other => Err(self.mismatch(&other)),
                }
            }
            Serializer::Json => {
                self.require(column, &[ColumnType::Text])?;
                match value {
                    Value::Null => Ok(Value::Null),
                    other => Ok(Value::Text(serde_json::to_string(&other.to_json())?)),
                }
            }
            Serializer::Custom(custom) => custom.serialize(column, value),
        }
    }

    /// Converts a storage-native value from `column` back into its in-memory value.
    pub fn deserialize(&self, column: &ColumnDefinition, value: Value) -> Result<Value> {
        match self {
            Serializer::Default => Ok(value),
            Serializer::Boolean => {
                self.require(column, &[ColumnType::Integer])?;
                Ok(Value::Boolean(!matches!(value, Value::Null | Value::Integer(0))))
            }
            Serializer::Time => {
                self.require(column, &[ColumnType::Integer, ColumnType::Float, ColumnType::Text])?;
                match value {
                    Value::Null => Ok(Value::Null),
                    Value::Integer(secs) => epoch_micros_to_time(secs.saturating_mul(1_000_000), secs),
                    Value::Float(secs) => {
                        epoch_micros_to_time((secs * 1_000_000.0).round() as i64, secs)
                    }
                    Value::Text(raw) => time_from_iso8601(&raw).map(Value::Timestamp),
                    other => Err(self.mismatch(&other)),
                }
            }
            Serializer::Date => {
                self.require(column, &[ColumnType::Text])?;
                match value {
                    Value::Null => Ok(Value::Null),
                    Value::Text(raw) => date_from_iso8601(&raw).map(Value::Timestamp),
                    other => Err(self.mismatch(&other)),
                }
            }
            Serializer::Json => {
                self.require(column, &[ColumnType::Text])?;
                match value {
                    Value::Null => Ok(Value::Null),
                    Value::Text(raw) => Ok(Value::Json(serde_json::from_str(&raw)?)),
                    other => Err(self.mismatch(&other)),
                }
            }
            Serializer::Custom(custom) => custom.deserialize(column, value),
        }
    }

    fn require(&self, column: &ColumnDefinition, supported: &[ColumnType]) -> Result<()> {
        if supported.contains(&column.column_type()) {
            Ok(())
        } else {
            Err(ModelError::TypeMismatch {
                serializer: self.name(),
                column_type: column.column_type().as_str(),
            })
        }
    }

    fn mismatch(&self, value: &Value) -> ModelError {
        ModelError::UnexpectedValue {
            serializer: self.name(),
            kind: value.kind(),
        }
    }
}

fn epoch_micros_to_time(micros: i64, raw: impl fmt::Display) -> Result<Value> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|utc| Value::Timestamp(utc.with_timezone(&Utc.fix())))
        .ok_or_else(|| ModelError::Parse(raw.to_string()))
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS[.mmm]<zone>`.
///
/// The zone is `Z` for a zero UTC offset and `+HH:MM`/`-HH:MM` otherwise;
/// fractional seconds are written, as milliseconds, only when at least one
/// millisecond is present.
pub fn time_to_iso8601(time: &DateTime<FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let zone = if offset == 0 {
        "Z".to_string()
    } else {
        let sign = if offset < 0 { '-' } else { '+' };
        let abs = offset.abs();
        format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
    };

    let base = time.format("%Y-%m-%dT%H:%M:%S");
    let millis = time.timestamp_subsec_millis();
    if millis != 0 {
        format!("{base}.{millis:03}{zone}")
    } else {
        format!("{base}{zone}")
    }
}

/// Parses an ISO-8601 timestamp. Fractional seconds are discarded and a
/// missing zone is read as UTC.
///
/// # Errors
///
/// Returns [`ModelError::Parse`] carrying the input for malformed strings.
pub fn time_from_iso8601(raw: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || ModelError::Parse(raw.to_string());
    let caps = TIME_PATTERN.captures(raw).ok_or_else(invalid)?;
    let field = |i: usize| caps[i].parse::<i64>().map_err(|_| invalid());

    let (year, month, day) = (field(1)?, field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);

    // Group 8 is `Z`; groups 9-11 are the sign, hours and minutes of a numeric zone.
    let offset_secs = match caps.get(9) {
        None => 0,
        Some(sign) => {
            let sign = if sign.as_str() == "-" { -1 } else { 1 };
            let (hours, minutes) = (field(10)?, field(11)?);
            let seconds = i32::try_from(hours * 3600 + minutes * 60).map_err(|_| invalid())?;
            sign * seconds
        }
    };
    let offset = FixedOffset::east_opt(offset_secs).ok_or_else(invalid)?;

    offset
        .with_ymd_and_hms(
            i32::try_from(year).map_err(|_| invalid())?,
            month as u32,
            day as u32,
            hour as u32,
            minute as u32,
            second as u32,
        )
        .single()
        .ok_or_else(invalid)
}

/// Parses a `YYYY-MM-DD` date as midnight UTC.
///
/// # Errors
///
/// Returns [`ModelError::Parse`] carrying the input for malformed strings.
pub fn date_from_iso8601(raw: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || ModelError::Parse(raw.to_string());
    let caps = DATE_PATTERN.captures(raw).ok_or_else(invalid)?;
    let year: i32 = caps[1].parse().map_err(|_| invalid())?;
    let month: u32 = caps[2].parse().map_err(|_| invalid())?;
    let day: u32 = caps[3].parse().map_err(|_| invalid())?;

    let midnight = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&midnight).with_timezone(&Utc.fix()))
}
