//! The model registry: every class the console can create, and the typed
//! fields each class declares.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};

use super::record::Record;

/// Column types a declared field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Text/string data.
    Text,
    /// Integer numbers.
    Integer,
    /// Floating point numbers.
    Float,
}

impl FieldType {
    /// Get the SQL name for this type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "REAL",
        }
    }

    /// Parse raw console text into a value of this type.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            FieldType::Text => Some(Value::String(raw.to_string())),
            FieldType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            FieldType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
        }
    }

    /// Coerce an already-typed value (e.g. from a mapping literal) into this type.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Text, Value::String(s)) => Some(Value::String(s)),
            (FieldType::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
            (FieldType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Some(Value::from(i)),
                // 6.0 -> 6, but 6.5 is rejected rather than truncated
                None => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::from(f as i64)),
            },
            (FieldType::Float, Value::Number(n)) => {
                n.as_f64().and_then(Number::from_f64).map(Value::Number)
            }
            (ty, Value::String(s)) => ty.parse(&s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// A declared field of a model class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn text(name: &'static str) -> FieldDef {
    FieldDef { name, ty: FieldType::Text }
}

const fn integer(name: &'static str) -> FieldDef {
    FieldDef { name, ty: FieldType::Integer }
}

const fn float(name: &'static str) -> FieldDef {
    FieldDef { name, ty: FieldType::Float }
}

const USER_FIELDS: &[FieldDef] = &[
    text("email"),
    text("password"),
    text("first_name"),
    text("last_name"),
];
const STATE_FIELDS: &[FieldDef] = &[text("name")];
const CITY_FIELDS: &[FieldDef] = &[text("state_id"), text("name")];
const AMENITY_FIELDS: &[FieldDef] = &[text("name")];
const PLACE_FIELDS: &[FieldDef] = &[
    text("city_id"),
    text("user_id"),
    text("name"),
    text("description"),
    integer("number_rooms"),
    integer("number_bathrooms"),
    integer("max_guest"),
    integer("price_by_night"),
    float("latitude"),
    float("longitude"),
];
const REVIEW_FIELDS: &[FieldDef] = &[text("place_id"), text("user_id"), text("text")];

/// A registered model class.
///
/// The set is closed: a class name either resolves to one of these
/// variants or the console reports `class doesn't exist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelClass {
    BaseModel,
    User,
    State,
    City,
    Amenity,
    Place,
    Review,
}

impl ModelClass {
    /// Every registered class, in registry order.
    pub const ALL: [ModelClass; 7] = [
        ModelClass::BaseModel,
        ModelClass::User,
        ModelClass::State,
        ModelClass::City,
        ModelClass::Amenity,
        ModelClass::Place,
        ModelClass::Review,
    ];

    /// Resolve a class name. Names are case-sensitive.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }

    /// The class name as typed at the console and stored in keys.
    pub fn name(&self) -> &'static str {
        match self {
            ModelClass::BaseModel => "BaseModel",
            ModelClass::User => "User",
            ModelClass::State => "State",
            ModelClass::City => "City",
            ModelClass::Amenity => "Amenity",
            ModelClass::Place => "Place",
            ModelClass::Review => "Review",
        }
    }

    /// The relational table backing this class.
    pub fn table_name(&self) -> &'static str {
        match self {
            ModelClass::BaseModel => "base_models",
            ModelClass::User => "users",
            ModelClass::State => "states",
            ModelClass::City => "cities",
            ModelClass::Amenity => "amenities",
            ModelClass::Place => "places",
            ModelClass::Review => "reviews",
        }
    }

    /// Declared fields, in column order.
    pub fn fields(&self) -> &'static [FieldDef] {
        match self {
            ModelClass::BaseModel => &[],
            ModelClass::User => USER_FIELDS,
            ModelClass::State => STATE_FIELDS,
            ModelClass::City => CITY_FIELDS,
            ModelClass::Amenity => AMENITY_FIELDS,
            ModelClass::Place => PLACE_FIELDS,
            ModelClass::Review => REVIEW_FIELDS,
        }
    }

    /// Declared type of a field, if the class declares it.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields().iter().find(|f| f.name == name).map(|f| f.ty)
    }

    /// Build an empty record with a fresh id and timestamps.
    pub fn instantiate(&self) -> Record {
        Record::new(*self)
    }

    /// Build a record and assign the given attributes.
    ///
    /// Reserved names are ignored.
    pub fn instantiate_with<I>(&self, attributes: I) -> Record
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut record = Record::new(*self);
        for (name, value) in attributes {
            record.set(name, value);
        }
        record
    }
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a class name is not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClass(pub String);

impl fmt::Display for UnknownClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown class '{}'", self.0)
    }
}

impl std::error::Error for UnknownClass {}

impl FromStr for ModelClass {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| UnknownClass(s.to_string()))
    }
}
