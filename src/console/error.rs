//! Console error types.
//!
//! Every variant displays as the exact line the console prints for it.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for console commands.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Errors a command can report. None of them end the REPL.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("** class name missing **")]
    ClassNameMissing,

    #[error("** class doesn't exist **")]
    ClassNotFound,

    #[error("** instance id missing **")]
    InstanceIdMissing,

    #[error("** no instance found **")]
    InstanceNotFound,

    #[error("** attribute name missing **")]
    AttributeNameMissing,

    #[error("** value missing **")]
    AttributeValueMissing,

    /// A value that can't be coerced to the field's declared type.
    #[error("** invalid value for {name}: {value} **")]
    InvalidValue { name: String, value: String },

    #[error("*** Unknown syntax: {0}")]
    UnknownSyntax(String),

    /// Backend failure; fatal to the current command only.
    #[error("** {0} **")]
    Storage(#[from] StorageError),

    /// Failure writing console output. The REPL can't continue after this.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Check if this error should stop the REPL instead of being printed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsoleError::Io(_))
    }

    /// Turn a fatal error back into the output failure that caused it.
    pub fn into_io(self) -> std::io::Error {
        match self {
            ConsoleError::Io(e) => e,
            other => std::io::Error::other(other.to_string()),
        }
    }
}
