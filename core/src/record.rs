//! Record types and their schema descriptors.
//!
//! A record type is a plain Rust struct implementing [`Record`]: it lists
//! its own attributes and rebuilds itself from an attribute map. Everything
//! the store learns about the backing table (columns, defaults and the
//! serializer bound to each column) lives in a [`RecordDescriptor`], which
//! the [`Store`](crate::Store) builds once per type by introspecting the
//! table and then keeps for the life of the store.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::column::ColumnDefinition;
use crate::error::{ModelError, Result, validate_identifier};
use crate::serializer::Serializer;
use crate::storage::{Row, Storage};
use crate::value::{Attributes, Value};

/// Columns that receive the time serializer and automatic timestamps.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

/// Persistence state carried by every record instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordState {
    persisted: bool,
}

impl RecordState {
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

/// A typed entity mapped to one table.
///
/// # Examples
///
/// ```
/// use litemodel_core::{Attributes, ModelBuilder, Record, RecordState, Result};
///
/// #[derive(Debug, Default)]
/// struct Event {
///     id: Option<i64>,
///     name: String,
///     state: RecordState,
/// }
///
/// impl Record for Event {
///     fn define(model: ModelBuilder) -> Result<ModelBuilder> {
///         model.serialize("name", "json")
///     }
///
///     fn from_attributes(attrs: &Attributes) -> Result<Self> {
///         Ok(Self {
///             id: attrs.value("id")?,
///             name: attrs.value("name")?,
///             state: RecordState::default(),
///         })
///     }
///
///     fn attributes(&self) -> Attributes {
///         Attributes::new().with("id", self.id).with("name", self.name.as_str())
///     }
///
///     fn state(&self) -> &RecordState {
///         &self.state
///     }
///
///     fn state_mut(&mut self) -> &mut RecordState {
///         &mut self.state
///     }
/// }
///
/// assert_eq!(Event::table_name(), "events");
/// ```
pub trait Record: Sized + 'static {
    /// Table backing this record type; the lowercased type name plus `s`.
    fn table_name() -> String {
        default_table_name(std::any::type_name::<Self>())
    }

    /// Primary-key column, or `None` for tables without one.
    fn primary_key() -> Option<&'static str> {
        Some("id")
    }

    /// Registers per-attribute serializers. Called once when the type's
    /// descriptor is built.
    fn define(model: ModelBuilder) -> Result<ModelBuilder> {
        Ok(model)
    }

    /// Builds an instance from attribute values.
    fn from_attributes(attrs: &Attributes) -> Result<Self>;

    /// Current attribute values, one entry per declared field.
    fn attributes(&self) -> Attributes;

    fn state(&self) -> &RecordState;

    fn state_mut(&mut self) -> &mut RecordState;

    fn is_persisted(&self) -> bool {
        self.state().is_persisted()
    }
}

/// Derives a table name from a Rust type path: `app::models::Event` → `events`.
pub fn default_table_name(type_path: &str) -> String {
    let base = type_path.split('<').next().unwrap_or(type_path);
    let short = base.rsplit("::").next().unwrap_or(base);
    format!("{}s", short.to_lowercase())
}

/// Serializer registrations for one record type.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    serializers: Vec<(String, Serializer)>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a built-in serializer by tag (`time`, `boolean`, `json`, `date`).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownSerializer`] for any other tag.
    pub fn serialize(self, attribute: impl Into<String>, tag: &str) -> Result<Self> {
        Ok(self.serialize_with(attribute, Serializer::from_tag(tag)?))
    }

    /// Registers a serializer value, replacing any earlier registration.
    pub fn serialize_with(mut self, attribute: impl Into<String>, serializer: Serializer) -> Self {
        let attribute = attribute.into();
        self.serializers.retain(|(name, _)| *name != attribute);
        self.serializers.push((attribute, serializer));
        self
    }

    pub fn serializer(&self, attribute: &str) -> Option<&Serializer> {
        self.serializers
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, serializer)| serializer)
    }
}

/// A column together with the serializer bound to its attribute.
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub column: ColumnDefinition,
    pub serializer: Serializer,
}

/// Schema descriptor for one record type.
#[derive(Debug)]
pub struct RecordDescriptor {
    table: String,
    primary_key: Option<String>,
    columns: Vec<BoundColumn>,
    index: HashMap<String, usize>,
}

impl RecordDescriptor {
    /// Introspects the table backing `R` and binds its serializers.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingTable`] when the table has no columns,
    /// [`ModelError::UnknownAttribute`] when a serializer is registered for
    /// an attribute with no column, and any registration error from
    /// [`Record::define`].
    pub fn load<R: Record>(storage: &dyn Storage) -> Result<Self> {
        let table = R::table_name();
        validate_identifier(&table)?;

        let rows = storage.execute(&format!("PRAGMA table_info({table})"))?;
        if rows.is_empty() {
            return Err(ModelError::MissingTable(table));
        }
        let columns = rows
            .iter()
            .map(ColumnDefinition::from_pragma)
            .collect::<Result<Vec<_>>>()?;

        let mut model = ModelBuilder::new();
        for name in TIMESTAMP_COLUMNS {
            if columns.iter().any(|c| c.name() == name) {
                model = model.serialize_with(name, Serializer::Time);
            }
        }
        let model = R::define(model)?;

        let descriptor = Self::new(table, R::primary_key().map(str::to_string), columns, &model)?;
        debug!(table = %descriptor.table, columns = descriptor.columns.len(), "loaded record descriptor");
        Ok(descriptor)
    }

    /// Builds a descriptor from known columns and serializer registrations.
    pub fn new(
        table: String,
        primary_key: Option<String>,
        columns: Vec<ColumnDefinition>,
        model: &ModelBuilder,
    ) -> Result<Self> {
        for (attribute, _) in &model.serializers {
            if !columns.iter().any(|c| c.name() == attribute) {
                return Err(ModelError::UnknownAttribute {
                    table,
                    attribute: attribute.clone(),
                });
            }
        }

        let columns: Vec<BoundColumn> = columns
            .into_iter()
            .map(|column| {
                let serializer = model.serializer(column.name()).cloned().unwrap_or_default();
                BoundColumn { column, serializer }
            })
            .collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, bound)| (bound.column.name().to_string(), i))
            .collect();

        Ok(Self {
            table,
            primary_key,
            columns,
            index,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().map(|bound| &bound.column)
    }

    pub fn column(&self, name: &str) -> Option<&BoundColumn> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Column defaults keyed by attribute name.
    pub fn defaults(&self) -> Attributes {
        self.columns
            .iter()
            .filter_map(|bound| {
                let default = bound.column.default_value()?;
                Some((bound.column.name().to_string(), default.clone()))
            })
            .collect()
    }

    /// Sets `updated_at` to `now`, and `created_at` when it is unset, for
    /// whichever of the two columns the table has.
    pub fn apply_timestamps(&self, attrs: &mut Attributes, now: DateTime<FixedOffset>) {
        if self.has_column("updated_at") {
            attrs.set("updated_at", now);
        }
        if self.has_column("created_at") && attrs.get("created_at").is_none_or(Value::is_null) {
            attrs.set("created_at", now);
        }
    }

    /// Serializes attribute values into storage parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownAttribute`] for attributes without a
    /// column, and any serializer error.
    pub fn serialize(&self, attrs: &Attributes) -> Result<Attributes> {
        let mut params = Attributes::new();
        for (name, value) in attrs.iter() {
            let bound = self.column(name).ok_or_else(|| ModelError::UnknownAttribute {
                table: self.table.clone(),
                attribute: name.to_string(),
            })?;
            params.set(name, bound.serializer.serialize(&bound.column, value.clone())?);
        }
        Ok(params)
    }

    /// Serializes attributes for a write, leaving out the primary key.
    pub fn serialize_for_write(&self, attrs: &Attributes) -> Result<Attributes> {
        let mut attrs = attrs.clone();
        if let Some(pk) = &self.primary_key {
            attrs.remove(pk);
        }
        self.serialize(&attrs)
    }

    /// Deserializes one stored value for `name`. Columns unknown to the
    /// descriptor pass through unchanged.
    pub fn deserialize_value(&self, name: &str, value: Value) -> Result<Value> {
        match self.column(name) {
            Some(bound) => bound.serializer.deserialize(&bound.column, value),
            None => Ok(value),
        }
    }

    /// Deserializes every value of a result row.
    pub fn deserialize_row(&self, row: Row) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        for (name, value) in row {
            let value = self.deserialize_value(&name, value)?;
            attrs.set(name, value);
        }
        Ok(attrs)
    }
}
