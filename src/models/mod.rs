//! Domain model: the registry of record classes and the record type itself.
//!
//! Every record carries an opaque `id` and `created_at`/`updated_at`
//! bookkeeping; everything else is a named attribute whose type is fixed by
//! the class's declared fields where one exists.

mod class;
mod record;

pub use class::{FieldDef, FieldType, ModelClass, UnknownClass};
pub use record::{format_timestamp, parse_timestamp, Record, TIMESTAMP_FORMAT};
