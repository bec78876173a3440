use lox::{Config, Interpreter, LoxError};

/// Interprets `source` with a fresh interpreter and returns everything written to its output.
pub fn run_source(source: &str) -> Result<String, LoxError> {
    run_source_with(source, Config::default())
}

pub fn run_source_with(source: &str, config: Config) -> Result<String, LoxError> {
    let mut out = Vec::new();
    Interpreter::with_config(config).interpret_with(source, &mut out)?;
    Ok(String::from_utf8(out).expect("interpreter output is utf-8"))
}

/// Asserts that `source` prints `expected` followed by a single newline.
pub fn assert_prints(source: &str, expected: &str) {
    match run_source(source) {
        Ok(output) => assert_eq!(output, format!("{}\n", expected), "source: {}", source),
        Err(err) => panic!("source {:?} failed: {}", source, err),
    }
}
