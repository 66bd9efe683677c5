//! Versioned schema migrations with a ledger table.
//!
//! Applied versions are recorded in `schema_migrations`, one row per
//! version. [`Migrator::run`] applies every declared migration that is not
//! in the ledger, lowest version first. Each version's DDL and its ledger
//! row are written inside one [`Storage::atomically`] unit, so a failed
//! migration leaves no ledger row behind.
//!
//! # Example
//!
//! ```ignore
//! let migrations = vec![
//!     MigrationDefinition::new(1, None).create_table(TableDefinition::new("events").text("name")),
//!     MigrationDefinition::new(2, Some("index names"))
//!         .add_index(IndexDefinition::new("events", &["name"])),
//! ];
//!
//! let mut migrator = Migrator::new(&store, migrations)?;
//! let applied = migrator.run()?;
//! assert_eq!(applied, vec![1, 2]);
//! assert!(migrator.run()?.is_empty());
//! ```

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::column::{ColumnDefinition, ColumnType};
use crate::error::{ModelError, Result};
use crate::record::{Record, RecordState};
use crate::schema::{MigrationDefinition, TableDefinition};
use crate::storage::Storage;
use crate::store::Store;
use crate::value::Attributes;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "schema_migrations";

/// One row of the migration ledger.
#[derive(Debug, Clone, Default)]
pub struct SchemaMigration {
    pub version: i64,
    state: RecordState,
}

impl Record for SchemaMigration {
    fn table_name() -> String {
        LEDGER_TABLE.to_string()
    }

    fn primary_key() -> Option<&'static str> {
        None
    }

    fn from_attributes(attrs: &Attributes) -> Result<Self> {
        Ok(Self {
            version: attrs.value("version")?,
            state: RecordState::default(),
        })
    }

    fn attributes(&self) -> Attributes {
        Attributes::new().with("version", self.version)
    }

    fn state(&self) -> &RecordState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }
}

/// The ledger table definition.
pub fn ledger_table() -> TableDefinition {
    TableDefinition::new(LEDGER_TABLE)
        .without_primary_key()
        .column(ColumnDefinition::new(ColumnType::Integer, "version").not_null())
        .index(&["version"], true)
}

/// Applied and pending migration versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub applied: Vec<i64>,
    pub pending: Vec<i64>,
}

/// Applies declared migrations against a store.
pub struct Migrator<'s, S: Storage> {
    store: &'s Store<S>,
    migrations: Vec<MigrationDefinition>,
    migrated: Option<Vec<i64>>,
}

impl<'s, S: Storage> Migrator<'s, S> {
    /// Creates a migrator, creating the ledger table when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateMigration`] if two migrations share a
    /// version, or any storage error from creating the ledger.
    pub fn new(store: &'s Store<S>, mut migrations: Vec<MigrationDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for migration in &migrations {
            if !seen.insert(migration.version()) {
                return Err(ModelError::DuplicateMigration(migration.version()));
            }
        }
        migrations.sort_by_key(MigrationDefinition::version);

        let storage = store.storage();
        if !storage.table_exists(LEDGER_TABLE)? {
            debug!(table = LEDGER_TABLE, "creating migration ledger");
            ledger_table().execute(storage)?;
        }

        Ok(Self {
            store,
            migrations,
            migrated: None,
        })
    }

    /// Declared migrations, lowest version first.
    pub fn migrations(&self) -> &[MigrationDefinition] {
        &self.migrations
    }

    /// Versions recorded in the ledger, ascending. Read once and cached.
    pub fn migrated(&mut self) -> Result<&[i64]> {
        if self.migrated.is_none() {
            let mut versions: Vec<i64> = self
                .store
                .query::<SchemaMigration>()
                .find_all()?
                .into_iter()
                .map(|row| row.version)
                .collect();
            versions.sort_unstable();
            self.migrated = Some(versions);
        }
        Ok(self.migrated.as_deref().unwrap_or_default())
    }

    /// Declared migrations not yet in the ledger, lowest version first.
    pub fn pending(&mut self) -> Result<Vec<&MigrationDefinition>> {
        let migrated: HashSet<i64> = self.migrated()?.iter().copied().collect();
        Ok(self
            .migrations
            .iter()
            .filter(|migration| !migrated.contains(&migration.version()))
            .collect())
    }

    pub fn status(&mut self) -> Result<MigrationStatus> {
        let pending = self.pending()?.iter().map(|m| m.version()).collect();
        let applied = self.migrated()?.to_vec();
        Ok(MigrationStatus { applied, pending })
    }

    /// Applies every pending migration and returns the versions applied.
    ///
    /// Stops at the first failing migration; versions applied before it
    /// stay applied. The store's descriptor cache is cleared whenever any
    /// version was applied, so later reads see the new table layout.
    pub fn run(&mut self) -> Result<Vec<i64>> {
        let pending: Vec<MigrationDefinition> = self.pending()?.into_iter().cloned().collect();
        debug!(
            pending = pending.len(),
            skipped = self.migrations.len() - pending.len(),
            "checked migration ledger"
        );
        let mut applied = Vec::new();

        for migration in &pending {
            if let Err(err) = self.apply(migration) {
                if !applied.is_empty() {
                    self.store.clear_descriptors();
                }
                return Err(err);
            }
            applied.push(migration.version());
            if let Some(migrated) = self.migrated.as_mut() {
                migrated.push(migration.version());
            }
        }

        if !applied.is_empty() {
            self.store.clear_descriptors();
        }
        Ok(applied)
    }

    fn apply(&self, migration: &MigrationDefinition) -> Result<()> {
        let store = self.store;
        let storage = store.storage();
        info!(version = migration.version(), name = migration.name(), "applying migration");
        storage.atomically(&mut || {
            migration.execute(storage)?;
            store.create::<SchemaMigration>(Attributes::new().with("version", migration.version()))?;
            Ok(())
        })
    }
}
