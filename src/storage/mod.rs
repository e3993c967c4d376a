//! storage layer for hbnb
//!
//! This module defines the storage engine contract and its two backends.
//! The console only ever talks to a `Box<dyn StorageEngine>`; which backend
//! sits behind it is decided once, at startup, from configuration.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │      all / get / count / new / save / delete / reload       │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                             │
//!                 ▼                             ▼
//!         ┌──────────────┐              ┌──────────────┐
//!         │ FileStorage  │              │  DbStorage   │
//!         │ (JSON file)  │              │  (SQLite)    │
//!         └──────────────┘              └──────────────┘
//!                 │                             │
//!                 └──────────────┬──────────────┘
//!                                ▼
//!                        ┌──────────────┐
//!                        │ ObjectTable  │
//!                        │ ClassName.id │
//!                        └──────────────┘
//! ```
//!
//! Both backends key records as `ClassName.id` and return identical field
//! contents for the same logical record.
//!
//! # Usage
//!
//! ```no_run
//! use hbnb::models::ModelClass;
//! use hbnb::storage::{FileStorage, StorageEngine};
//!
//! let mut storage = FileStorage::new("file.json");
//! storage.reload()?;
//!
//! let record = ModelClass::State.instantiate();
//! storage.new(record)?;
//! storage.save()?;
//!
//! let states = storage.all(Some(ModelClass::State))?;
//! # Ok::<(), hbnb::storage::StorageError>(())
//! ```

mod document;
mod errors;
mod file;
mod relational;
mod types;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::{ModelClass, Record};

pub use errors::{StorageError, StorageResult};
pub use file::FileStorage;
pub use relational::{DbConfig, DbStorage, Environment};
pub use types::{InvalidKeyError, ObjectTable, StorageKey};

/// Which backend an engine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    File,
    Db,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::File => "file",
            BackendKind::Db => "db",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "fs" | "json" => Ok(BackendKind::File),
            "db" | "sql" | "sqlite" => Ok(BackendKind::Db),
            other => Err(format!("unknown storage type '{}' (expected 'file' or 'db')", other)),
        }
    }
}

/// The storage engine contract.
///
/// Every call blocks until the backend is done; nothing here is
/// cancellable. Visibility is in-process: records registered with `new` or
/// removed with `delete` show up in `all` immediately, and reach durable
/// storage on the next `save`.
pub trait StorageEngine {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// All records, optionally only those of one class.
    fn all(&self, class: Option<ModelClass>) -> StorageResult<ObjectTable>;

    /// Look up a single record by key.
    fn get(&self, key: &StorageKey) -> StorageResult<Option<Record>>;

    /// Number of records, optionally only those of one class.
    fn count(&self, class: Option<ModelClass>) -> StorageResult<usize> {
        Ok(self.all(class)?.len())
    }

    /// Register a record, replacing any record under the same key.
    fn new(&mut self, record: Record) -> StorageResult<()>;

    /// Flush everything to durable storage.
    ///
    /// On failure the previous durable image is left as it was.
    fn save(&mut self) -> StorageResult<()>;

    /// Remove a record. `None` and unknown records are no-ops.
    fn delete(&mut self, record: Option<&Record>) -> StorageResult<()>;

    /// Repopulate from durable storage, discarding unsaved changes.
    fn reload(&mut self) -> StorageResult<()>;

    /// Release backend resources. Safe to call more than once.
    fn close(&mut self) -> StorageResult<()>;
}

/// Storage configuration, resolved before the engine is opened.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Which backend to open.
    pub backend: BackendKind,
    /// JSON document path for the file backend.
    pub file_path: PathBuf,
    /// Settings for the relational backend.
    pub db: DbConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            file_path: PathBuf::from(FileStorage::DEFAULT_PATH),
            db: DbConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Create a configuration for the given backend.
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    /// Set the JSON document path.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = path.into();
        self
    }

    /// Set the relational backend settings.
    pub fn db(mut self, db: DbConfig) -> Self {
        self.db = db;
        self
    }
}

/// Build the configured engine. The engine is not reloaded yet.
pub fn open_storage(config: &StorageConfig) -> Box<dyn StorageEngine> {
    match config.backend {
        BackendKind::File => Box::new(FileStorage::new(&config.file_path)),
        BackendKind::Db => Box::new(DbStorage::new(config.db.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engines(dir: &tempfile::TempDir) -> Vec<Box<dyn StorageEngine>> {
        vec![
            Box::new(FileStorage::new(dir.path().join("file.json"))),
            Box::new(DbStorage::new(
                DbConfig::new(dir.path().join("hbnb.db")).environment(Environment::Test),
            )),
        ]
    }

    /// Replays the same operations on a backend and returns what it holds
    /// after a fresh reload.
    fn replay(storage: &mut dyn StorageEngine, fixtures: &[Record], updated: &Record) -> ObjectTable {
        storage.reload().unwrap();
        for record in fixtures {
            storage.new(record.clone()).unwrap();
        }
        storage.save().unwrap();

        // update one, destroy another
        storage.new(updated.clone()).unwrap();
        storage.delete(Some(&fixtures[1])).unwrap();
        storage.save().unwrap();

        storage.close().unwrap();
        storage.reload().unwrap();
        storage.all(None).unwrap()
    }

    #[test]
    fn test_backend_parity() {
        let mut place = ModelClass::Place.instantiate();
        place.set("name", json!("Loft"));
        place.set("number_rooms", json!(4));
        place.set("latitude", json!(37.77));
        let state = ModelClass::State.instantiate_with(vec![("name".into(), json!("Nevada"))]);
        let user = ModelClass::User.instantiate();
        let base = ModelClass::BaseModel.instantiate_with(vec![("mood".into(), json!(7))]);
        let fixtures = vec![place, state, user, base];

        // one update shared by both engines, so the timestamps agree
        let mut updated = fixtures[0].clone();
        updated.set("name", json!("Renamed"));
        updated.set("extra_note", json!("kept"));
        updated.touch();

        let dir = tempfile::TempDir::new().unwrap();
        let tables: Vec<ObjectTable> = engines(&dir)
            .iter_mut()
            .map(|engine| replay(engine.as_mut(), &fixtures, &updated))
            .collect();

        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0], tables[1]);
        assert_eq!(tables[1].get(&StorageKey::of(&updated)), Some(&updated));
        let renamed = tables[0].get(&StorageKey::of(&fixtures[0])).unwrap();
        assert_eq!(renamed.get("name"), Some(&json!("Renamed")));
        assert_eq!(renamed.get("extra_note"), Some(&json!("kept")));
    }

    #[test]
    fn test_round_trip_preserves_identity() {
        let dir = tempfile::TempDir::new().unwrap();
        for mut engine in engines(&dir) {
            engine.reload().unwrap();
            let record = ModelClass::Review.instantiate_with(vec![("text".into(), json!("Great"))]);
            engine.new(record.clone()).unwrap();
            engine.save().unwrap();
            engine.close().unwrap();

            engine.reload().unwrap();
            let restored = engine.get(&StorageKey::of(&record)).unwrap().unwrap();
            assert_eq!(restored, record, "backend {}", engine.kind());
        }
    }

    #[test]
    fn test_unsaved_changes_visible_then_discarded() {
        let dir = tempfile::TempDir::new().unwrap();
        for mut engine in engines(&dir) {
            engine.reload().unwrap();
            let record = ModelClass::Amenity.instantiate();
            engine.new(record.clone()).unwrap();
            assert_eq!(engine.count(Some(ModelClass::Amenity)).unwrap(), 1);

            engine.reload().unwrap();
            assert_eq!(engine.count(Some(ModelClass::Amenity)).unwrap(), 0);
            assert!(engine.get(&StorageKey::of(&record)).unwrap().is_none());
        }
    }

    #[test]
    fn test_delete_none_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        for mut engine in engines(&dir) {
            engine.reload().unwrap();
            engine.new(ModelClass::City.instantiate()).unwrap();
            engine.delete(None).unwrap();
            engine.delete(Some(&ModelClass::City.instantiate())).unwrap();
            assert_eq!(engine.count(None).unwrap(), 1);
        }
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("file".parse::<BackendKind>(), Ok(BackendKind::File));
        assert_eq!("DB".parse::<BackendKind>(), Ok(BackendKind::Db));
        assert!("mysql".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_open_storage_selects_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::new(BackendKind::Db)
            .db(DbConfig::new(dir.path().join("x.db")))
            .file_path(dir.path().join("x.json"));
        assert_eq!(open_storage(&config).kind(), BackendKind::Db);
        assert_eq!(open_storage(&StorageConfig::default()).kind(), BackendKind::File);
    }
}
