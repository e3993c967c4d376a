//! hbnb - an object persistence console
//!
//! A small set of model classes (users, places, reviews and friends) kept
//! in one of two interchangeable storage engines: a JSON document on disk
//! or a SQLite database. The console reads commands like `create State` or
//! `User.show("<id>")` and runs them against whichever engine is configured.
//!
//! # Example
//!
//! ```no_run
//! use hbnb::console::Console;
//! use hbnb::storage::{BackendKind, StorageConfig};
//!
//! let mut console = Console::open(&StorageConfig::new(BackendKind::File)).unwrap();
//! let mut out = std::io::stdout();
//! console.handle_line(r#"create State name="California""#, &mut out).unwrap();
//! console.handle_line("State.all()", &mut out).unwrap();
//! ```

pub mod config;
pub mod console;
pub mod logging;
pub mod models;
pub mod storage;
