//! hbnb console
//!
//! This is the main entry point for the hbnb command-line interface.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use hbnb::config::Cli;
use hbnb::console::{Console, Repl, ReplConfig};
use hbnb::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli.storage_config();
    let mut console = match Console::open(&config) {
        Ok(console) => console,
        Err(e) => {
            error!(
                backend = %config.backend,
                unavailable = e.is_unavailable(),
                error = %e,
                "failed to load storage"
            );
            if e.is_data_error() {
                eprintln!("Error reading storage: {}", e);
            } else {
                eprintln!("Error opening storage: {}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.execute {
        Some(line) => console.handle_line(&line, &mut std::io::stdout()).map(|_| ()),
        None => Repl::with_config(&mut console, ReplConfig::for_stdin()).run_stdio(),
    };

    if let Err(e) = console.shutdown() {
        error!(error = %e, "failed to close storage");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
