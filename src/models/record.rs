//! The record type shared by every model class.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde_json::Value;

use super::class::ModelClass;

/// Timestamp layout used in every durable representation.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Format a timestamp for storage.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts RFC 3339 as well as the native layout.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .ok()
}

/// Current time at storage precision, so a save/reload cycle is lossless.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A domain record: identity, timestamp bookkeeping and typed attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    class: ModelClass,
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    attributes: BTreeMap<String, Value>,
}

impl Record {
    /// Attribute names that belong to the bookkeeping and can't be assigned.
    pub const RESERVED: &'static [&'static str] = &["id", "created_at", "updated_at", "__class__"];

    /// Create a record with a fresh ULID and both timestamps set to now.
    pub fn new(class: ModelClass) -> Self {
        let ts = now();
        Self {
            class,
            id: ulid::Ulid::new().to_string().to_lowercase(),
            created_at: ts,
            updated_at: ts,
            attributes: BTreeMap::new(),
        }
    }

    /// Rebuild a record from durable storage without regenerating identity.
    pub fn restore(
        class: ModelClass,
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            class,
            id: id.into(),
            created_at,
            updated_at,
            attributes,
        }
    }

    pub fn class(&self) -> ModelClass {
        self.class
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Non-bookkeeping attributes, ordered by name.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Get an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Check whether a name is reserved for bookkeeping.
    pub fn is_reserved(name: &str) -> bool {
        Self::RESERVED.contains(&name)
    }

    /// Assign an attribute. Returns `false` and leaves the record untouched
    /// when the name is reserved.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        if Self::is_reserved(&name) {
            return false;
        }
        self.attributes.insert(name, value);
        true
    }

    /// Refresh `updated_at`; called before every mutating save.
    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// Repr-style literal: strings quoted, numbers bare.
fn repr_value(value: &Value) -> String {
    match value {
        Value::String(s) => repr_str(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn repr_str(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

impl fmt::Display for Record {
    /// `[ClassName] (id) {'id': ..., 'created_at': ..., 'updated_at': ..., ...}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ({}) {{'id': {}, 'created_at': {}, 'updated_at': {}",
            self.class,
            self.id,
            repr_str(&self.id),
            repr_str(&format_timestamp(&self.created_at)),
            repr_str(&format_timestamp(&self.updated_at)),
        )?;
        for (name, value) in &self.attributes {
            write!(f, ", {}: {}", repr_str(name), repr_value(value))?;
        }
        write!(f, "}}")
    }
}
