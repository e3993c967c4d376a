//! Record <-> JSON field map conversion.
//!
//! A stored record is a flat JSON object:
//! ```text
//! {
//!   "__class__": "Place",
//!   "id": "01hxyz...",
//!   "created_at": "2017-09-28T21:05:54.119427",
//!   "updated_at": "2017-09-28T21:05:54.119572",
//!   "name": "My house",
//!   "number_rooms": 6
//! }
//! ```
//! The file backend stores a whole table of these keyed by `ClassName.id`;
//! the relational backend reuses the attribute half for its
//! `extra_attributes` column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{format_timestamp, parse_timestamp, ModelClass, Record};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{ObjectTable, StorageKey};

/// internal format for one record
#[derive(Debug, Serialize, Deserialize)]
struct RecordJson {
    #[serde(rename = "__class__")]
    class: String,
    id: String,
    created_at: String,
    updated_at: String,
    #[serde(flatten)]
    attributes: BTreeMap<String, Value>,
}

impl RecordJson {
    fn from_record(record: &Record) -> Self {
        Self {
            class: record.class().name().to_string(),
            id: record.id().to_string(),
            created_at: format_timestamp(&record.created_at()),
            updated_at: format_timestamp(&record.updated_at()),
            attributes: record.attributes().clone(),
        }
    }

    fn into_record(self, location: &str) -> StorageResult<Record> {
        let class = ModelClass::lookup(&self.class)
            .ok_or_else(|| StorageError::UnknownClass(self.class.clone()))?;
        let created_at = parse_timestamp(&self.created_at).ok_or_else(|| {
            StorageError::corrupted(location, format!("bad created_at '{}'", self.created_at))
        })?;
        let updated_at = parse_timestamp(&self.updated_at).ok_or_else(|| {
            StorageError::corrupted(location, format!("bad updated_at '{}'", self.updated_at))
        })?;
        Ok(Record::restore(class, self.id, created_at, updated_at, self.attributes))
    }
}

/// serialize a full object table to JSON bytes
///
/// keys come out in table order, so identical tables give identical bytes
pub fn serialize_table(table: &ObjectTable) -> StorageResult<Vec<u8>> {
    let document: BTreeMap<String, RecordJson> = table
        .iter()
        .map(|(key, record)| (key.to_string(), RecordJson::from_record(record)))
        .collect();
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// deserialize a full object table from JSON bytes
///
/// every entry's key must match the key derived from its own content
pub fn deserialize_table(bytes: &[u8]) -> StorageResult<ObjectTable> {
    let document: BTreeMap<String, RecordJson> = serde_json::from_slice(bytes)?;
    let mut table = ObjectTable::new();

    for (raw_key, entry) in document {
        let record = entry.into_record(&raw_key)?;
        let derived = StorageKey::of(&record);
        if derived.to_string() != raw_key {
            return Err(StorageError::corrupted(
                raw_key.as_str(),
                format!("key mismatch: content belongs under '{}'", derived),
            ));
        }
        table.upsert(record);
    }

    Ok(table)
}

/// encode attributes as a JSON object string
pub fn encode_attributes(attributes: &BTreeMap<String, Value>) -> StorageResult<String> {
    Ok(serde_json::to_string(attributes)?)
}

/// decode a JSON object string back into attributes
pub fn decode_attributes(raw: &str) -> StorageResult<BTreeMap<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(raw)?)
}
