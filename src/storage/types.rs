//! core key and table types for the storage layer.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{ModelClass, Record};

/// The storage key of a record: `ClassName.id`.
///
/// Kept as a typed pair rather than a joined string. Class names never
/// contain a `.`, so splitting at the first `.` recovers the pair exactly
/// and two records of different classes can't share a key, whatever their
/// ids look like.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    class: ModelClass,
    id: String,
}

impl StorageKey {
    /// create a key from its parts
    pub fn new(class: ModelClass, id: impl Into<String>) -> Self {
        Self { class, id: id.into() }
    }

    /// derive the key of a record
    pub fn of(record: &Record) -> Self {
        Self::new(record.class(), record.id())
    }

    pub fn class(&self) -> ModelClass {
        self.class
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Ord for StorageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class
            .name()
            .cmp(other.class.name())
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for StorageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.id)
    }
}

/// error type for keys that can't be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidKeyError {
    MissingSeparator(String),
    UnknownClass(String),
    EmptyId(String),
}

impl fmt::Display for InvalidKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator(key) => write!(f, "key '{}' has no '.' separator", key),
            Self::UnknownClass(class) => write!(f, "key names unknown class '{}'", class),
            Self::EmptyId(key) => write!(f, "key '{}' has an empty id", key),
        }
    }
}

impl std::error::Error for InvalidKeyError {}

impl FromStr for StorageKey {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, id) = s
            .split_once('.')
            .ok_or_else(|| InvalidKeyError::MissingSeparator(s.to_string()))?;
        let class = ModelClass::lookup(class)
            .ok_or_else(|| InvalidKeyError::UnknownClass(class.to_string()))?;
        if id.is_empty() {
            return Err(InvalidKeyError::EmptyId(s.to_string()));
        }
        Ok(Self::new(class, id))
    }
}

/// The in-memory object table: storage key -> record, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectTable {
    objects: BTreeMap<StorageKey, Record>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// insert or replace a record under its derived key
    pub fn upsert(&mut self, record: Record) -> Option<Record> {
        self.objects.insert(StorageKey::of(&record), record)
    }

    pub fn remove(&mut self, key: &StorageKey) -> Option<Record> {
        self.objects.remove(key)
    }

    pub fn get(&self, key: &StorageKey) -> Option<&Record> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// records of one class, or all of them
    pub fn filtered(&self, class: Option<ModelClass>) -> ObjectTable {
        match class {
            None => self.clone(),
            Some(class) => self
                .objects
                .iter()
                .filter(|(key, _)| key.class() == class)
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect(),
        }
    }

    pub fn count(&self, class: Option<ModelClass>) -> usize {
        match class {
            None => self.objects.len(),
            Some(class) => self.objects.keys().filter(|key| key.class() == class).count(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StorageKey, &Record)> {
        self.objects.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StorageKey> {
        self.objects.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.objects.values()
    }
}

impl FromIterator<(StorageKey, Record)> for ObjectTable {
    fn from_iter<I: IntoIterator<Item = (StorageKey, Record)>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<Record> for ObjectTable {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut table = ObjectTable::new();
        for record in iter {
            table.upsert(record);
        }
        table
    }
}

impl IntoIterator for ObjectTable {
    type Item = (StorageKey, Record);
    type IntoIter = std::collections::btree_map::IntoIter<StorageKey, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}
