//! The record store: persistence lifecycle over a storage connection.
//!
//! [`Store`] owns the storage connection and a registry of
//! [`RecordDescriptor`]s keyed by record type. Descriptors are built on
//! first use by introspecting the backing table and kept until explicitly
//! forgotten.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(storage);
//! let mut event = store.create::<Event>(Attributes::new().with("name", "launched"))?;
//! event.name = "landed".to_string();
//! store.save(&mut event)?;
//!
//! let latest = store.query::<Event>().order("id desc").first()?;
//! ```

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::{ModelError, Result};
use crate::query::Query;
use crate::record::{Record, RecordDescriptor};
use crate::scope::Scope;
use crate::storage::{Row, Storage};
use crate::value::{Attributes, Value};

/// Storage connection plus per-type schema descriptors.
pub struct Store<S: Storage> {
    storage: S,
    descriptors: RefCell<HashMap<TypeId, Arc<RecordDescriptor>>>,
}

impl<S: Storage> Store<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            descriptors: RefCell::new(HashMap::new()),
        }
    }

    /// Returns a reference to the underlying storage connection.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consumes the store and returns the underlying storage connection.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Returns the descriptor for `R`, introspecting its table on first use.
    pub fn descriptor<R: Record>(&self) -> Result<Arc<RecordDescriptor>> {
        let key = TypeId::of::<R>();
        if let Some(descriptor) = self.descriptors.borrow().get(&key) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(RecordDescriptor::load::<R>(&self.storage)?);
        self.descriptors
            .borrow_mut()
            .insert(key, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Drops the cached descriptor for `R`; the next use re-introspects.
    pub fn forget<R: Record>(&self) {
        self.descriptors.borrow_mut().remove(&TypeId::of::<R>());
    }

    /// Drops every cached descriptor.
    pub fn clear_descriptors(&self) {
        self.descriptors.borrow_mut().clear();
    }

    /// Returns an unconstrained query over `R`'s table.
    pub fn query<R: Record>(&self) -> Query<'_, R, S> {
        Query::new(self, Scope::new(R::table_name()))
    }

    /// Builds an unpersisted record from column defaults overlaid with `attrs`.
    pub fn build<R: Record>(&self, attrs: Attributes) -> Result<R> {
        let descriptor = self.descriptor::<R>()?;
        R::from_attributes(&descriptor.defaults().merged(&attrs))
    }

    /// Builds a record and saves it immediately.
    pub fn create<R: Record>(&self, attrs: Attributes) -> Result<R> {
        let mut record = self.build::<R>(attrs)?;
        self.save(&mut record)?;
        Ok(record)
    }

    /// Writes `record` to storage.
    ///
    /// Persisted records are updated in place by primary key; new records
    /// are inserted and receive the row id assigned by the store. The
    /// primary key is never part of the written values. Afterwards the
    /// record is rebuilt from the written attributes and marked persisted.
    pub fn save<R: Record>(&self, record: &mut R) -> Result<()> {
        self.save_at(record, now())
    }

    fn save_at<R: Record>(&self, record: &mut R, now: DateTime<FixedOffset>) -> Result<()> {
        let descriptor = self.descriptor::<R>()?;
        let mut attrs = record.attributes();
        descriptor.apply_timestamps(&mut attrs, now);
        let params = descriptor.serialize_for_write(&attrs)?;

        if record.is_persisted() {
            let scope = self.primary_key_scope(&descriptor, &attrs)?;
            self.storage.update(&scope, &params)?;
        } else {
            let id = self.storage.insert(descriptor.table(), &params)?;
            if let Some(pk) = descriptor.primary_key() {
                attrs.set(pk, id);
            }
        }

        let mut saved = R::from_attributes(&attrs)?;
        saved.state_mut().mark_persisted();
        *record = saved;
        Ok(())
    }

    /// Deletes the row backing `record`.
    ///
    /// The instance itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnpersistedDelete`] if the record was never
    /// saved and [`ModelError::NoPrimaryKey`] if its table has no key.
    pub fn delete<R: Record>(&self, record: &R) -> Result<usize> {
        if !record.is_persisted() {
            return Err(ModelError::UnpersistedDelete);
        }
        let descriptor = self.descriptor::<R>()?;
        let scope = self.primary_key_scope(&descriptor, &record.attributes())?;
        self.storage.delete(&scope)
    }

    /// Builds a persisted record from a stored row, deserializing each
    /// column through its serializer.
    pub fn from_table_row<R: Record>(&self, row: Row) -> Result<R> {
        let descriptor = self.descriptor::<R>()?;
        let attrs = descriptor.deserialize_row(row)?;
        let mut record = R::from_attributes(&attrs)?;
        record.state_mut().mark_persisted();
        Ok(record)
    }

    fn primary_key_scope(&self, descriptor: &RecordDescriptor, attrs: &Attributes) -> Result<Scope> {
        let pk = descriptor
            .primary_key()
            .ok_or_else(|| ModelError::NoPrimaryKey(descriptor.table().to_string()))?;
        let id = attrs.get(pk).cloned().unwrap_or(Value::Null);
        Ok(Scope::new(descriptor.table()).filter(Attributes::new().with(pk, id)))
    }
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&Utc.fix())
}
