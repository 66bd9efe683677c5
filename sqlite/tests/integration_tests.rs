//! Integration tests for the litemodel-sqlite crate.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use litemodel_core::{
    Attributes, ColumnDefinition, ColumnType, IndexDefinition, MigrationDefinition, MigrationStatus, Migrator,
    ModelBuilder, ModelError, Record, RecordState, Result, Serializer, Storage, Store, TableDefinition, Value,
};
use litemodel_sqlite::{SqliteStorage, StoreConfig, connect};

#[derive(Debug, Default, Clone)]
struct Event {
    id: Option<i64>,
    name: String,
    published: bool,
    happened_on: Option<DateTime<FixedOffset>>,
    payload: Option<serde_json::Value>,
    created_at: Option<DateTime<FixedOffset>>,
    updated_at: Option<DateTime<FixedOffset>>,
    state: RecordState,
}

impl Record for Event {
    fn define(model: ModelBuilder) -> Result<ModelBuilder> {
        model
            .serialize("published", "boolean")?
            .serialize("happened_on", "date")?
            .serialize("payload", "json")
    }

    fn from_attributes(attrs: &Attributes) -> Result<Self> {
        Ok(Self {
            id: attrs.value("id")?,
            name: attrs.value::<Option<String>>("name")?.unwrap_or_default(),
            published: attrs.value::<Option<bool>>("published")?.unwrap_or(false),
            happened_on: attrs.value("happened_on")?,
            payload: match attrs.get("payload") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.to_json()),
            },
            created_at: attrs.value("created_at")?,
            updated_at: attrs.value("updated_at")?,
            state: RecordState::default(),
        })
    }

    fn attributes(&self) -> Attributes {
        Attributes::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("published", self.published)
            .with("happened_on", self.happened_on)
            .with("payload", self.payload.clone())
            .with("created_at", self.created_at)
            .with("updated_at", self.updated_at)
    }

    fn state(&self) -> &RecordState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }
}

fn migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::new(1, Some("create events")).create_table(
            TableDefinition::new("events")
                .column(ColumnDefinition::new(ColumnType::Text, "name").not_null().default("untitled"))
                .column(ColumnDefinition::new(ColumnType::Integer, "published").not_null().default(0))
                .text("happened_on")
                .text("payload")
                .timestamps(),
        ),
        MigrationDefinition::new(2, None).add_index(IndexDefinition::new("events", &["name"])),
    ]
}

fn migrated_store() -> Store<SqliteStorage> {
    let store = connect(&StoreConfig::memory()).unwrap();
    Migrator::new(&store, migrations()).unwrap().run().unwrap();
    store
}

#[test]
fn test_migrator_applies_once() {
    let store = connect(&StoreConfig::memory()).unwrap();

    let mut migrator = Migrator::new(&store, migrations()).unwrap();
    assert_eq!(migrator.run().unwrap(), vec![1, 2]);

    let mut again = Migrator::new(&store, migrations()).unwrap();
    assert!(again.run().unwrap().is_empty());
    assert_eq!(
        again.status().unwrap(),
        MigrationStatus {
            applied: vec![1, 2],
            pending: Vec::new(),
        }
    );

    let indexes: i64 = store
        .storage()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'index_events_on_name'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(indexes, 1);
}

#[test]
fn test_ledger_rejects_duplicate_version_rows() {
    let store = migrated_store();
    let err = store
        .storage()
        .connection()
        .execute("INSERT INTO schema_migrations (version) VALUES (1)", [])
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE"));
}

#[test]
fn test_failed_migration_is_rolled_back() {
    let store = connect(&StoreConfig::memory()).unwrap();
    let broken = vec![
        MigrationDefinition::new(1, None).create_table(TableDefinition::new("events").text("name")),
        MigrationDefinition::new(2, None)
            .create_table(TableDefinition::new("notes").text("body"))
            .add_index(IndexDefinition::new("missing", &["nope"])),
        MigrationDefinition::new(3, None).create_table(TableDefinition::new("later").text("body")),
    ];

    let mut migrator = Migrator::new(&store, broken).unwrap();
    assert!(matches!(migrator.run(), Err(ModelError::Storage(_))));

    assert!(store.storage().table_exists("events").unwrap());
    assert!(!store.storage().table_exists("notes").unwrap());
    assert!(!store.storage().table_exists("later").unwrap());
    assert_eq!(migrator.status().unwrap().applied, vec![1]);
}

#[test]
fn test_create_then_find() {
    let store = migrated_store();
    let event: Event = store.create(Attributes::new().with("name", "x")).unwrap();

    assert!(event.is_persisted());
    assert_eq!(event.id, Some(1));
    assert!(event.created_at.is_some());
    assert_eq!(event.created_at, event.updated_at);

    let found = store.query::<Event>().find(1).unwrap().unwrap();
    assert_eq!(found.name, "x");
    assert!(!found.published);
    assert!(found.is_persisted());
    assert_eq!(found.created_at.map(|t| t.timestamp()), event.created_at.map(|t| t.timestamp()));
}

#[test]
fn test_build_uses_column_defaults() {
    let store = migrated_store();
    let event: Event = store.build(Attributes::new()).unwrap();
    assert_eq!(event.name, "untitled");
    assert!(!event.published);
    assert!(!event.is_persisted());
}

#[test]
fn test_save_persisted_updates_in_place() {
    let store = migrated_store();
    let mut event: Event = store.create(Attributes::new().with("name", "x")).unwrap();
    let created = event.created_at;

    event.name = "renamed".to_string();
    event.published = true;
    store.save(&mut event).unwrap();

    let query = store.query::<Event>();
    assert_eq!(query.count().unwrap(), 1);
    let stored = query.first().unwrap().unwrap();
    assert_eq!(stored.name, "renamed");
    assert!(stored.published);
    assert_eq!(stored.id, event.id);
    assert_eq!(stored.created_at.map(|t| t.timestamp()), created.map(|t| t.timestamp()));
}

#[test]
fn test_serializers_round_trip_through_sqlite() {
    let store = migrated_store();
    let day = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap().fixed_offset();
    let payload = serde_json::json!({"tags": ["a", "b"], "count": 2});

    store
        .create::<Event>(
            Attributes::new()
                .with("name", "launch")
                .with("published", true)
                .with("happened_on", day)
                .with("payload", payload.clone()),
        )
        .unwrap();

    let raw: (i64, String, String) = store
        .storage()
        .connection()
        .query_row("SELECT published, happened_on, payload FROM events", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!(raw.0, 1);
    assert_eq!(raw.1, "2024-03-05");
    assert_eq!(serde_json::from_str::<serde_json::Value>(&raw.2).unwrap(), payload);

    let event = store.query::<Event>().first().unwrap().unwrap();
    assert!(event.published);
    assert_eq!(event.happened_on, Some(day));
    assert_eq!(event.payload, Some(payload));
}

#[test]
fn test_scope_first_returns_latest_match() {
    let store = migrated_store();
    for name in ["x", "y", "x"] {
        store.create::<Event>(Attributes::new().with("name", name)).unwrap();
    }

    let query = store
        .query::<Event>()
        .filter(Attributes::new().with("name", "x"))
        .order("id desc")
        .limit(1);
    assert_eq!(query.scope().predicate(), "WHERE name = ? ORDER BY id desc LIMIT 1");
    assert_eq!(query.scope().predicate_values(), vec![Value::from("x")]);

    let found = query.find_all().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, Some(3));
}

#[test]
fn test_pluck_and_calculations() {
    let store = migrated_store();
    for (name, published) in [("a", true), ("b", false), ("c", true)] {
        store
            .create::<Event>(Attributes::new().with("name", name).with("published", published))
            .unwrap();
    }

    let query = store.query::<Event>();
    assert_eq!(
        query.order("id").pluck("published").unwrap(),
        vec![Value::Boolean(true), Value::Boolean(false), Value::Boolean(true)]
    );
    assert_eq!(query.sum("published").unwrap(), Some(Value::Integer(2)));
    assert_eq!(query.maximum("name").unwrap(), Some(Value::from("c")));
    assert_eq!(query.count_column("happened_on").unwrap(), 0);

    let published = query.filter(Attributes::new().with("published", true));
    assert_eq!(published.count().unwrap(), 2);
    assert!(published.exists().unwrap());
}

#[test]
fn test_update_all_and_delete_all() {
    let store = migrated_store();
    for name in ["a", "b", "c"] {
        store.create::<Event>(Attributes::new().with("name", name)).unwrap();
    }

    let changed = store
        .query::<Event>()
        .filter(Attributes::new().with("name", "b"))
        .update_all(Attributes::new().with("published", true))
        .unwrap();
    assert_eq!(changed, 1);
    assert_eq!(
        store
            .query::<Event>()
            .filter(Attributes::new().with("published", 1))
            .pluck("name")
            .unwrap(),
        vec![Value::from("b")]
    );

    let removed = store
        .query::<Event>()
        .filter(Attributes::new().with("published", false))
        .delete_all()
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.query::<Event>().count().unwrap(), 1);
}

#[test]
fn test_bulk_writes_on_ordered_limited_query() {
    let store = migrated_store();
    for name in ["a", "b", "c"] {
        store.create::<Event>(Attributes::new().with("name", name)).unwrap();
    }

    let newest = store.query::<Event>().order("id desc").limit(1);
    assert_eq!(newest.update_all(Attributes::new().with("published", true)).unwrap(), 3);
    assert_eq!(newest.delete_all().unwrap(), 3);
    assert!(!store.query::<Event>().exists().unwrap());
}

#[test]
fn test_pluck_unknown_column() {
    let store = migrated_store();
    let err = store.query::<Event>().pluck("colour").unwrap_err();
    assert!(matches!(err, ModelError::UnknownAttribute { attribute, .. } if attribute == "colour"));
}

#[test]
fn test_delete_record() {
    let store = migrated_store();
    let keep: Event = store.create(Attributes::new().with("name", "keep")).unwrap();
    let gone: Event = store.create(Attributes::new().with("name", "gone")).unwrap();

    assert_eq!(store.delete(&gone).unwrap(), 1);
    assert!(store.query::<Event>().find(gone.id).unwrap().is_none());
    assert!(store.query::<Event>().find(keep.id).unwrap().is_some());

    let unsaved: Event = store.build(Attributes::new()).unwrap();
    assert!(matches!(store.delete(&unsaved), Err(ModelError::UnpersistedDelete)));
}

#[test]
fn test_missing_table() {
    let store = connect(&StoreConfig::memory()).unwrap();
    assert!(matches!(
        store.query::<Event>().find_all(),
        Err(ModelError::MissingTable(table)) if table == "events"
    ));
}

#[test]
fn test_descriptor_refreshes_after_migration() {
    #[derive(Debug, Default)]
    struct Note {
        id: Option<i64>,
        body: Option<String>,
        state: RecordState,
    }

    impl Record for Note {
        fn from_attributes(attrs: &Attributes) -> Result<Self> {
            Ok(Self {
                id: attrs.value("id")?,
                body: attrs.value("body")?,
                state: RecordState::default(),
            })
        }

        fn attributes(&self) -> Attributes {
            Attributes::new().with("id", self.id).with("body", self.body.clone())
        }

        fn state(&self) -> &RecordState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut RecordState {
            &mut self.state
        }
    }

    let store = connect(&StoreConfig::memory()).unwrap();
    assert!(store.descriptor::<Note>().is_err());

    Migrator::new(
        &store,
        vec![MigrationDefinition::new(1, None).create_table(TableDefinition::new("notes").text("body"))],
    )
    .unwrap()
    .run()
    .unwrap();

    let note: Note = store.create(Attributes::new().with("body", "hello")).unwrap();
    assert_eq!(note.id, Some(1));
    assert_eq!(store.descriptor::<Note>().unwrap().columns().count(), 2);
}

#[test]
fn test_custom_serializer() {
    #[derive(Debug)]
    struct Cents;

    impl litemodel_core::AttributeSerializer for Cents {
        fn serialize(&self, _column: &ColumnDefinition, value: Value) -> Result<Value> {
            Ok(match value {
                Value::Float(amount) => Value::Integer((amount * 100.0).round() as i64),
                other => other,
            })
        }

        fn deserialize(&self, _column: &ColumnDefinition, value: Value) -> Result<Value> {
            Ok(match value {
                Value::Integer(cents) => Value::Float(cents as f64 / 100.0),
                other => other,
            })
        }
    }

    #[derive(Debug, Default)]
    struct Payment {
        id: Option<i64>,
        amount: f64,
        state: RecordState,
    }

    impl Record for Payment {
        fn define(model: ModelBuilder) -> Result<ModelBuilder> {
            Ok(model.serialize_with("amount", Serializer::Custom(std::sync::Arc::new(Cents))))
        }

        fn from_attributes(attrs: &Attributes) -> Result<Self> {
            Ok(Self {
                id: attrs.value("id")?,
                amount: attrs.value::<Option<f64>>("amount")?.unwrap_or_default(),
                state: RecordState::default(),
            })
        }

        fn attributes(&self) -> Attributes {
            Attributes::new().with("id", self.id).with("amount", self.amount)
        }

        fn state(&self) -> &RecordState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut RecordState {
            &mut self.state
        }
    }

    let store = connect(&StoreConfig::memory()).unwrap();
    Migrator::new(
        &store,
        vec![MigrationDefinition::new(1, None).create_table(TableDefinition::new("payments").integer("amount"))],
    )
    .unwrap()
    .run()
    .unwrap();

    store.create::<Payment>(Attributes::new().with("amount", 12.34)).unwrap();
    let stored: i64 = store
        .storage()
        .connection()
        .query_row("SELECT amount FROM payments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, 1234);
    assert_eq!(store.query::<Payment>().first().unwrap().unwrap().amount, 12.34);
}

#[test]
fn test_file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::file(dir.path().join("app.sqlite3"));

    {
        let store = connect(&config).unwrap();
        Migrator::new(&store, migrations()).unwrap().run().unwrap();
        store.create::<Event>(Attributes::new().with("name", "kept")).unwrap();
    }

    let store = connect(&config).unwrap();
    let mut migrator = Migrator::new(&store, migrations()).unwrap();
    assert!(migrator.pending().unwrap().is_empty());
    assert_eq!(store.query::<Event>().pluck("name").unwrap(), vec![Value::from("kept")]);
}
