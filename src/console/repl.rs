//! Interactive REPL (Read-Eval-Print Loop) for the console.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::debug;

use super::{Console, Flow};

/// REPL configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt string.
    pub prompt: String,
    /// Print the prompt before each line.
    pub interactive: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "(hbnb) ".into(),
            interactive: true,
        }
    }
}

impl ReplConfig {
    /// Interactive only when stdin is a terminal.
    pub fn for_stdin() -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
            ..Default::default()
        }
    }
}

/// The line loop driving a console.
pub struct Repl<'a> {
    console: &'a mut Console,
    config: ReplConfig,
    history: Vec<String>,
}

impl<'a> Repl<'a> {
    /// Create a new REPL over the given console.
    pub fn new(console: &'a mut Console) -> Self {
        Self::with_config(console, ReplConfig::default())
    }

    /// Create a REPL with custom configuration.
    pub fn with_config(console: &'a mut Console, config: ReplConfig) -> Self {
        Self {
            console,
            config,
            history: Vec::new(),
        }
    }

    /// Lines read so far, without the trailing newline.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Read lines until `quit` or end of input.
    ///
    /// End of input runs `EOF`, just as if it had been typed.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> io::Result<()> {
        loop {
            if self.config.interactive {
                write!(out, "{}", self.config.prompt)?;
                out.flush()?;
            }

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                debug!("end of input");
                self.console.onecmd("EOF", out)?;
                break;
            }

            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                self.history.push(line.to_string());
            }

            if self.console.handle_line(line, out)? == Flow::Exit {
                break;
            }
            out.flush()?;
        }

        out.flush()
    }

    /// Run over the process's stdin and stdout.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        self.run(stdin.lock(), &mut stdout)
    }
}
