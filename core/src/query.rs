//! Typed queries over one record type.

use std::marker::PhantomData;

use crate::error::{ModelError, Result};
use crate::record::Record;
use crate::scope::Scope;
use crate::storage::{Calculation, Storage};
use crate::store::Store;
use crate::value::{Attributes, Value};

/// A [`Scope`] bound to a store and a record type.
///
/// Builder methods return a new query and leave the receiver unchanged.
/// Rows read through a query are deserialized into `R` and marked
/// persisted.
pub struct Query<'s, R: Record, S: Storage> {
    store: &'s Store<S>,
    scope: Scope,
    record: PhantomData<fn() -> R>,
}

impl<R: Record, S: Storage> Clone for Query<'_, R, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            scope: self.scope.clone(),
            record: PhantomData,
        }
    }
}

impl<'s, R: Record, S: Storage> Query<'s, R, S> {
    pub fn new(store: &'s Store<S>, scope: Scope) -> Self {
        Self {
            store,
            scope,
            record: PhantomData,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Adds equality conditions; see [`Scope::filter`].
    #[doc(alias = "where")]
    pub fn filter(&self, conditions: Attributes) -> Self {
        Self::new(self.store, self.scope.filter(conditions))
    }

    pub fn order(&self, term: &str) -> Self {
        Self::new(self.store, self.scope.order(term))
    }

    pub fn limit(&self, limit: u64) -> Self {
        Self::new(self.store, self.scope.limit(limit))
    }

    /// Every record in the scope.
    pub fn find_all(&self) -> Result<Vec<R>> {
        self.store
            .storage()
            .select(&self.scope)?
            .into_iter()
            .map(|row| self.store.from_table_row(row))
            .collect()
    }

    /// The first record in the scope, if any.
    pub fn first(&self) -> Result<Option<R>> {
        let row = self.store.storage().select(&self.scope.limit(1))?.into_iter().next();
        row.map(|row| self.store.from_table_row(row)).transpose()
    }

    /// The record whose primary key equals `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NoPrimaryKey`](crate::ModelError::NoPrimaryKey)
    /// when the record type has no primary key.
    pub fn find(&self, id: impl Into<Value>) -> Result<Option<R>> {
        let descriptor = self.store.descriptor::<R>()?;
        let pk = descriptor
            .primary_key()
            .ok_or_else(|| ModelError::NoPrimaryKey(descriptor.table().to_string()))?;
        self.filter(Attributes::new().with(pk, id)).first()
    }

    /// Values of one column across the scope, deserialized through the
    /// column's serializer.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownAttribute`] when the table has no such
    /// column.
    pub fn pluck(&self, column: &str) -> Result<Vec<Value>> {
        let descriptor = self.store.descriptor::<R>()?;
        if !descriptor.has_column(column) {
            return Err(ModelError::UnknownAttribute {
                table: descriptor.table().to_string(),
                attribute: column.to_string(),
            });
        }
        self.store
            .storage()
            .select(&self.scope)?
            .into_iter()
            .map(|mut row| {
                let value = row.remove(column).unwrap_or_default();
                descriptor.deserialize_value(column, value)
            })
            .collect()
    }

    /// Runs an aggregate over the scope. `None` means the aggregate was
    /// `NULL`, as for the sum of an empty scope.
    pub fn calculate(&self, calculation: Calculation, column: Option<&str>) -> Result<Option<Value>> {
        self.store.storage().calculate(&self.scope, calculation, column)
    }

    /// Number of rows in the scope.
    pub fn count(&self) -> Result<i64> {
        let count = self.calculate(Calculation::Count, None)?;
        Ok(count.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    /// Number of non-null values of `column` in the scope.
    pub fn count_column(&self, column: &str) -> Result<i64> {
        let count = self.calculate(Calculation::Count, Some(column))?;
        Ok(count.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    pub fn sum(&self, column: &str) -> Result<Option<Value>> {
        self.calculate(Calculation::Sum, Some(column))
    }

    pub fn average(&self, column: &str) -> Result<Option<Value>> {
        self.calculate(Calculation::Average, Some(column))
    }

    pub fn minimum(&self, column: &str) -> Result<Option<Value>> {
        self.calculate(Calculation::Minimum, Some(column))
    }

    pub fn maximum(&self, column: &str) -> Result<Option<Value>> {
        self.calculate(Calculation::Maximum, Some(column))
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Updates every row in the scope with `params`, serialized through the
    /// record's column serializers. Returns the number of rows changed.
    ///
    /// Only the scope's conditions apply; its ordering and limit are
    /// ignored, so every matching row is updated.
    pub fn update_all(&self, params: Attributes) -> Result<usize> {
        let descriptor = self.store.descriptor::<R>()?;
        let params = descriptor.serialize(&params)?;
        self.store.storage().update(&self.scope.conditions_only(), &params)
    }

    /// Deletes every row in the scope and returns the number removed.
    ///
    /// Like [`update_all`](Self::update_all), ordering and limit are ignored.
    pub fn delete_all(&self) -> Result<usize> {
        self.store.storage().delete(&self.scope.conditions_only())
    }
}
