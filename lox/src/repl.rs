use std::{fs, path::Path};

use tracing::debug;

use crate::{config::Config, error::LoxError, interpreter::Interpreter};

const HISTORY_SAVE_PATH: &str = ".lox_history";
const PROMPT: &str = "> ";

/// Interprets the whole file at `path` once, printing its result to stdout.
pub fn run_file(path: &Path, config: Config) -> Result<(), LoxError> {
    let source = fs::read_to_string(path).map_err(|source| LoxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = source.len(), "read source file");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    Interpreter::with_config(config).interpret_with(&source, &mut out)
}

/// Reads lines until interrupted or end of input, interpreting each one on its own.
#[cfg(feature = "repl")]
pub fn repl(config: Config) {
    use rustyline::{error::ReadlineError, Config as EditorConfig, Editor};
    use tracing::warn;

    let rl_config = EditorConfig::builder()
        .history_ignore_dups(true)
        .max_history_size(1000)
        .build();
    let mut rl = Editor::<()>::with_config(rl_config);

    if let Err(err) = rl.load_history(HISTORY_SAVE_PATH) {
        debug!(error = %err, "no previous history");
    }

    let mut interpreter = Interpreter::with_config(config);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                interpreter.interpret(&line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                warn!(error = %err, "could not read line");
                break;
            }
        }
    }

    if let Err(err) = rl.save_history(HISTORY_SAVE_PATH) {
        warn!(error = %err, "could not save history");
    }
}

/// Reads lines until interrupted or end of input, interpreting each one on its own.
#[cfg(not(feature = "repl"))]
pub fn repl(config: Config) {
    use std::io::{self, BufRead, Write};

    use tracing::warn;

    let mut interpreter = Interpreter::with_config(config);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{}", PROMPT);
        if let Err(err) = io::stdout().flush() {
            warn!(error = %err, "could not flush prompt");
        }

        match lines.next() {
            Some(Ok(line)) => {
                interpreter.interpret(&line);
            }
            Some(Err(err)) => {
                warn!(error = %err, "could not read line");
                break;
            }
            None => {
                println!();
                break;
            }
        }
    }
}
