pub mod compiler;
pub mod config;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod object;
pub mod opcodes;
pub mod precedence;
pub mod repl;
pub mod scanner;
pub mod value;
pub mod vm;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::Config;
pub use error::LoxError;
pub use interpreter::{Interpreter, InterpreterResult};

/// Initialize logging on stderr.
///
/// Use the `RUST_LOG` environment variable to override the default `warn` filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
