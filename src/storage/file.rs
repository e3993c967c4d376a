//! JSON file backend.
//!
//! The whole object table lives in memory and is written out as a single
//! JSON document on every `save`. There is no cross-process locking: two
//! consoles writing the same file will overwrite each other, last writer
//! wins.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::models::{ModelClass, Record};
use crate::storage::document::{deserialize_table, serialize_table};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{ObjectTable, StorageKey};
use crate::storage::{BackendKind, StorageEngine};

/// File-serialized storage engine.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    objects: ObjectTable,
}

impl FileStorage {
    /// Document path used when none is configured.
    pub const DEFAULT_PATH: &'static str = "file.json";

    /// Create an engine over the given document. Nothing is read until `reload`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            objects: ObjectTable::new(),
        }
    }

    /// Get the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write bytes next to the target and rename over it, so readers see
    /// either the old document or the new one, never a torn write.
    fn atomic_write(&self, content: &[u8]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io_at(parent, e))?;
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        // flushed to disk before the rename, so a crash can't leave an empty document
        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::io_at(&temp_path, e));
        }
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::io_at(&self.path, e)
        })
    }
}

impl StorageEngine for FileStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn all(&self, class: Option<ModelClass>) -> StorageResult<ObjectTable> {
        Ok(self.objects.filtered(class))
    }

    fn get(&self, key: &StorageKey) -> StorageResult<Option<Record>> {
        Ok(self.objects.get(key).cloned())
    }

    fn count(&self, class: Option<ModelClass>) -> StorageResult<usize> {
        Ok(self.objects.count(class))
    }

    fn new(&mut self, record: Record) -> StorageResult<()> {
        trace!(key = %StorageKey::of(&record), "registering record");
        self.objects.upsert(record);
        Ok(())
    }

    fn save(&mut self) -> StorageResult<()> {
        let bytes = serialize_table(&self.objects)?;
        self.atomic_write(&bytes)?;
        debug!(path = %self.path.display(), records = self.objects.len(), "saved object table");
        Ok(())
    }

    fn delete(&mut self, record: Option<&Record>) -> StorageResult<()> {
        if let Some(record) = record {
            let key = StorageKey::of(record);
            if self.objects.remove(&key).is_some() {
                trace!(%key, "removed record");
            }
        }
        Ok(())
    }

    fn reload(&mut self) -> StorageResult<()> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no document yet, starting empty");
                self.objects.clear();
                return Ok(());
            }
            Err(e) => return Err(StorageError::io_at(&self.path, e)),
        };

        // only swap in the new table once the whole document parsed
        let objects = deserialize_table(&bytes)?;
        debug!(path = %self.path.display(), records = objects.len(), "reloaded object table");
        self.objects = objects;
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        // no handle is held between calls
        trace!(path = %self.path.display(), "file storage closed");
        Ok(())
    }
}
