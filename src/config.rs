//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::storage::{BackendKind, DbConfig, Environment, FileStorage, StorageConfig};

/// Command-line arguments. Every storage setting can also come from the
/// environment; an explicit flag wins.
#[derive(Debug, Parser)]
#[command(name = "hbnb")]
#[command(about = "hbnb - object persistence console", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Storage backend: `file` or `db`
    #[arg(long = "storage", env = "HBNB_TYPE_STORAGE", default_value = "file")]
    pub storage: BackendKind,

    /// JSON document used by the file backend
    #[arg(long = "file", env = "HBNB_FILE_PATH", default_value = FileStorage::DEFAULT_PATH)]
    pub file: PathBuf,

    /// SQLite database used by the db backend (`:memory:` for a scratch one)
    #[arg(long = "database", env = "HBNB_DB", default_value = "hbnb.db")]
    pub database: PathBuf,

    /// Environment mode; `test` drops the db schema on startup
    #[arg(long = "env", env = "HBNB_ENV", default_value = "dev")]
    pub env: Environment,

    /// Run a single command and exit
    #[arg(short = 'e', long = "execute", value_name = "COMMAND")]
    pub execute: Option<String>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the storage configuration.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(self.storage)
            .file_path(&self.file)
            .db(DbConfig::new(&self.database).environment(self.env))
    }
}
