//! SQLite backend.
//!
//! One table per model class, keyed by `id`, one column per declared field
//! plus an `extra_attributes` JSON column for everything the class doesn't
//! declare. Changes are staged in a session and applied in a single SQL
//! transaction on `save`.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Number, Value};
use tracing::{debug, info, trace};

use crate::models::{format_timestamp, parse_timestamp, ModelClass, Record};
use crate::storage::document::{decode_attributes, encode_attributes};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{ObjectTable, StorageKey};
use crate::storage::{BackendKind, StorageEngine};

const EXTRA_COLUMN: &str = "extra_attributes";

/// Deployment environment. `Test` rebuilds the schema when the session is
/// first established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    Test,
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("test") {
            Environment::Test
        } else {
            Environment::Dev
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Dev => f.write_str("dev"),
            Environment::Test => f.write_str("test"),
        }
    }
}

/// Relational backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// SQLite database path; `:memory:` for an ephemeral database.
    pub database: PathBuf,
    /// Environment mode.
    pub environment: Environment,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("hbnb.db"),
            environment: Environment::Dev,
        }
    }
}

impl DbConfig {
    pub const IN_MEMORY: &'static str = ":memory:";

    /// Create a configuration for the given database path.
    pub fn new(database: impl AsRef<Path>) -> Self {
        Self {
            database: database.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// An ephemeral in-memory database.
    pub fn in_memory() -> Self {
        Self::new(Self::IN_MEMORY)
    }

    /// Set the environment mode.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

/// SQLite-backed storage engine.
#[derive(Debug)]
pub struct DbStorage {
    config: DbConfig,
    conn: Option<Connection>,
    /// records registered since the last save
    pending: ObjectTable,
    /// keys deleted since the last save
    removed: BTreeSet<StorageKey>,
    /// test mode drops the schema once per engine, not on every reload
    schema_reset: bool,
}

fn no_session() -> StorageError {
    StorageError::Unavailable("no open database session; reload first".to_string())
}

fn column_list(class: ModelClass) -> Vec<&'static str> {
    let mut columns = vec!["id", "created_at", "updated_at"];
    columns.extend(class.fields().iter().map(|f| f.name));
    columns.push(EXTRA_COLUMN);
    columns
}

fn create_table_sql(class: ModelClass) -> String {
    let mut columns = vec![
        "id TEXT PRIMARY KEY NOT NULL".to_string(),
        "created_at TEXT NOT NULL".to_string(),
        "updated_at TEXT NOT NULL".to_string(),
    ];
    columns.extend(
        class
            .fields()
            .iter()
            .map(|f| format!("{} {}", f.name, f.ty.sql_name())),
    );
    columns.push(format!("{} TEXT NOT NULL DEFAULT '{{}}'", EXTRA_COLUMN));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        class.table_name(),
        columns.join(", ")
    )
}

fn select_sql(class: ModelClass, by_id: bool) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list(class).join(", "),
        class.table_name()
    );
    if by_id {
        sql.push_str(" WHERE id = ?1");
    } else {
        sql.push_str(" ORDER BY id");
    }
    sql
}

fn upsert_sql(class: ModelClass) -> String {
    let columns = column_list(class);
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .skip(1)
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        class.table_name(),
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

/// Scalar values bind to their column; anything else goes to the extra column.
fn column_binding(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real),
        },
        _ => None,
    }
}

fn column_value(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(Value::from(i)),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number),
        ValueRef::Text(t) => Some(Value::String(String::from_utf8_lossy(t).into_owned())),
    }
}

fn row_params(record: &Record) -> StorageResult<Vec<SqlValue>> {
    let class = record.class();
    let mut params = vec![
        SqlValue::Text(record.id().to_string()),
        SqlValue::Text(format_timestamp(&record.created_at())),
        SqlValue::Text(format_timestamp(&record.updated_at())),
    ];
    let mut extra = record.attributes().clone();

    for field in class.fields() {
        let bound = record.get(field.name).and_then(column_binding);
        if bound.is_some() {
            extra.remove(field.name);
        }
        params.push(bound.unwrap_or(SqlValue::Null));
    }
    params.push(SqlValue::Text(encode_attributes(&extra)?));
    Ok(params)
}

/// One row as read from the driver, before it is checked.
struct RawRow {
    id: String,
    created_at: String,
    updated_at: String,
    columns: Vec<(&'static str, Option<Value>)>,
    extra: String,
}

fn read_row(class: ModelClass, row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    let fields = class.fields();
    let mut columns = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        columns.push((field.name, column_value(row.get_ref(3 + i)?)));
    }
    Ok(RawRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        columns,
        extra: row.get(3 + fields.len())?,
    })
}

fn into_record(class: ModelClass, raw: RawRow) -> StorageResult<Record> {
    let location = format!("{}.{}", class.table_name(), raw.id);
    let created_at = parse_timestamp(&raw.created_at).ok_or_else(|| {
        StorageError::corrupted(location.as_str(), format!("bad created_at '{}'", raw.created_at))
    })?;
    let updated_at = parse_timestamp(&raw.updated_at).ok_or_else(|| {
        StorageError::corrupted(location.as_str(), format!("bad updated_at '{}'", raw.updated_at))
    })?;

    let mut attributes = decode_attributes(&raw.extra)?;
    for (name, value) in raw.columns {
        if let Some(value) = value {
            attributes.insert(name.to_string(), value);
        }
    }
    Ok(Record::restore(class, raw.id, created_at, updated_at, attributes))
}

fn query_class(conn: &Connection, class: ModelClass) -> StorageResult<Vec<Record>> {
    let mut stmt = conn.prepare(&select_sql(class, false))?;
    let rows = stmt
        .query_map([], |row| read_row(class, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(|raw| into_record(class, raw)).collect()
}

fn query_one(conn: &Connection, key: &StorageKey) -> StorageResult<Option<Record>> {
    let class = key.class();
    let raw = conn
        .query_row(&select_sql(class, true), [key.id()], |row| read_row(class, row))
        .optional()?;
    raw.map(|raw| into_record(class, raw)).transpose()
}

impl DbStorage {
    /// Create an engine. No connection is made until `reload`.
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            conn: None,
            pending: ObjectTable::new(),
            removed: BTreeSet::new(),
            schema_reset: false,
        }
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn session(&self) -> StorageResult<&Connection> {
        self.conn.as_ref().ok_or_else(no_session)
    }

    fn open(&self) -> StorageResult<Connection> {
        info!(database = %self.config.database.display(), env = %self.config.environment, "opening database session");
        Connection::open(&self.config.database).map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", self.config.database.display(), e))
        })
    }

    fn drop_schema(conn: &Connection) -> StorageResult<()> {
        for class in ModelClass::ALL {
            conn.execute(&format!("DROP TABLE IF EXISTS {}", class.table_name()), [])?;
        }
        Ok(())
    }

    fn create_schema(conn: &Connection) -> StorageResult<()> {
        for class in ModelClass::ALL {
            conn.execute(&create_table_sql(class), [])?;
        }
        Ok(())
    }
}

impl StorageEngine for DbStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Db
    }

    fn all(&self, class: Option<ModelClass>) -> StorageResult<ObjectTable> {
        let conn = self.session()?;
        let classes = match class {
            Some(class) => vec![class],
            None => ModelClass::ALL.to_vec(),
        };

        let mut table = ObjectTable::new();
        for class in classes {
            for record in query_class(conn, class)? {
                table.upsert(record);
            }
        }
        for key in &self.removed {
            table.remove(key);
        }
        for record in self.pending.filtered(class).into_iter().map(|(_, r)| r) {
            table.upsert(record);
        }
        Ok(table)
    }

    fn get(&self, key: &StorageKey) -> StorageResult<Option<Record>> {
        let conn = self.session()?;
        if self.removed.contains(key) {
            return Ok(None);
        }
        if let Some(record) = self.pending.get(key) {
            return Ok(Some(record.clone()));
        }
        query_one(conn, key)
    }

    fn new(&mut self, record: Record) -> StorageResult<()> {
        self.session()?;
        let key = StorageKey::of(&record);
        trace!(%key, "staging record");
        self.removed.remove(&key);
        self.pending.upsert(record);
        Ok(())
    }

    fn save(&mut self) -> StorageResult<()> {
        let conn = self.conn.as_mut().ok_or_else(no_session)?;
        let tx = conn.transaction()?;

        for key in &self.removed {
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1", key.class().table_name()),
                [key.id()],
            )?;
        }
        for record in self.pending.records() {
            let params = row_params(record)?;
            tx.execute(&upsert_sql(record.class()), params_from_iter(params))?;
        }
        // dropping an uncommitted transaction rolls it back
        tx.commit()?;

        debug!(
            upserted = self.pending.len(),
            deleted = self.removed.len(),
            "committed session"
        );
        self.pending.clear();
        self.removed.clear();
        Ok(())
    }

    fn delete(&mut self, record: Option<&Record>) -> StorageResult<()> {
        self.session()?;
        if let Some(record) = record {
            let key = StorageKey::of(record);
            trace!(%key, "staging removal");
            self.pending.remove(&key);
            self.removed.insert(key);
        }
        Ok(())
    }

    fn reload(&mut self) -> StorageResult<()> {
        if self.conn.is_none() {
            self.conn = Some(self.open()?);
        }
        let conn = self.session()?;

        if self.config.environment == Environment::Test && !self.schema_reset {
            info!("test environment: dropping schema");
            Self::drop_schema(conn)?;
        }
        Self::create_schema(conn)?;

        self.schema_reset = true;
        self.pending.clear();
        self.removed.clear();
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.pending.clear();
        self.removed.clear();
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(e.into());
            }
            debug!("database session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> DbStorage {
        let mut storage = DbStorage::new(DbConfig::in_memory());
        storage.reload().unwrap();
        storage
    }

    #[test]
    fn test_schema_has_table_per_class() {
        let storage = setup();
        let conn = storage.session().unwrap();
        for class in ModelClass::ALL {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [class.table_name()],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table for {}", class);
        }
    }

    #[test]
    fn test_declared_and_extra_columns() {
        let mut storage = setup();
        let mut place = ModelClass::Place.instantiate();
        place.set("number_rooms", json!(6));
        place.set("latitude", json!(37.77));
        place.set("colour", json!("blue"));
        storage.new(place.clone()).unwrap();
        storage.save().unwrap();

        let conn = storage.session().unwrap();
        let (rooms, extra): (i64, String) = conn
            .query_row(
                "SELECT number_rooms, extra_attributes FROM places WHERE id = ?1",
                [place.id()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(rooms, 6);
        assert_eq!(extra, r#"{"colour":"blue"}"#);

        let restored = storage.get(&StorageKey::of(&place)).unwrap().unwrap();
        assert_eq!(restored, place);
        assert!(restored.get("name").is_none());
    }

    #[test]
    fn test_closed_session_is_unavailable() {
        let mut storage = setup();
        storage.close().unwrap();
        storage.close().unwrap();
        assert!(!storage.is_open());

        let err = storage.all(None).unwrap_err();
        assert!(err.is_unavailable());
        assert!(storage.new(ModelClass::User.instantiate()).unwrap_err().is_unavailable());
        assert!(storage.save().unwrap_err().is_unavailable());
    }

    #[test]
    fn test_unopenable_database_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let mut storage = DbStorage::new(DbConfig::new(dir.path().join("missing").join("x.db")));
        assert!(storage.reload().unwrap_err().is_unavailable());
    }

    #[test]
    fn test_staged_delete_hides_row_until_reload() {
        let mut storage = setup();
        let state = ModelClass::State.instantiate();
        storage.new(state.clone()).unwrap();
        storage.save().unwrap();

        storage.delete(Some(&state)).unwrap();
        assert!(storage.get(&StorageKey::of(&state)).unwrap().is_none());
        assert_eq!(storage.count(Some(ModelClass::State)).unwrap(), 0);

        // reload discards the staged delete
        storage.reload().unwrap();
        assert!(storage.get(&StorageKey::of(&state)).unwrap().is_some());
    }

    #[test]
    fn test_new_after_delete_restores() {
        let mut storage = setup();
        let city = ModelClass::City.instantiate();
        storage.new(city.clone()).unwrap();
        storage.delete(Some(&city)).unwrap();
        storage.new(city.clone()).unwrap();
        storage.save().unwrap();
        assert_eq!(storage.count(None).unwrap(), 1);
    }

    #[test]
    fn test_test_environment_resets_schema_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hbnb.db");

        let mut dev = DbStorage::new(DbConfig::new(&path));
        dev.reload().unwrap();
        dev.new(ModelClass::Amenity.instantiate()).unwrap();
        dev.save().unwrap();
        dev.close().unwrap();

        let mut test = DbStorage::new(DbConfig::new(&path).environment(Environment::Test));
        test.reload().unwrap();
        assert_eq!(test.count(None).unwrap(), 0);

        test.new(ModelClass::Amenity.instantiate()).unwrap();
        test.save().unwrap();
        test.close().unwrap();
        test.reload().unwrap();
        assert_eq!(test.count(None).unwrap(), 1);
    }

    #[test]
    fn test_failed_save_rolls_back_and_keeps_staged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hbnb.db");
        let mut storage = DbStorage::new(DbConfig::new(&path));
        storage.reload().unwrap();

        let kept = ModelClass::User.instantiate();
        storage.new(kept.clone()).unwrap();
        storage.save().unwrap();

        // pull a table out from under the session
        let other = Connection::open(&path).unwrap();
        other.execute("DROP TABLE states", []).unwrap();
        drop(other);

        storage.delete(Some(&kept)).unwrap();
        storage.new(ModelClass::State.instantiate()).unwrap();
        assert!(storage.save().is_err());

        // the delete of `kept` was rolled back with the failed insert
        let conn = storage.session().unwrap();
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(storage.pending.len(), 1);
        assert_eq!(storage.removed.len(), 1);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
        assert_eq!("TEST".parse::<Environment>().unwrap(), Environment::Test);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Dev);
    }
}
