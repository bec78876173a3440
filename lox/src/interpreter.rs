use std::io::{self, Write};

use crate::{
    compiler::compile,
    config::Config,
    error::LoxError,
    heap::Heap,
    vm::Vm,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterResult {
    Ok,
    CompileError,
    RuntimeError,
    IoError,
}

impl InterpreterResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            InterpreterResult::Ok => 0,
            InterpreterResult::CompileError => 65,
            InterpreterResult::RuntimeError => 70,
            InterpreterResult::IoError => 74,
        }
    }
}

impl From<&LoxError> for InterpreterResult {
    fn from(err: &LoxError) -> Self {
        match err {
            LoxError::Compile(_) => InterpreterResult::CompileError,
            LoxError::Runtime(_) => InterpreterResult::RuntimeError,
            LoxError::Io { .. } | LoxError::Output(_) => InterpreterResult::IoError,
        }
    }
}

/// Compiles and runs one source text at a time against a single reusable VM.
pub struct Interpreter {
    vm: Vm,
    config: Config,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Interpreter {
            vm: Vm::new().with_trace_execution(config.trace_execution),
            config,
        }
    }

    /// Interprets `source`, writing the disassembly (when enabled) and the result to `out`.
    ///
    /// Every allocation made for this source lives in a heap that is dropped before
    /// returning, whether or not the run succeeded.
    pub fn interpret_with(&mut self, source: &str, out: &mut dyn Write) -> Result<(), LoxError> {
        let heap = Heap::new();
        let chunk = compile(source, &heap)?;

        if self.config.print_code {
            write!(out, "{}", chunk.disassemble("code")).map_err(LoxError::Output)?;
        }

        self.vm.run(&chunk, &heap, out)?;
        Ok(())
    }

    /// Interprets `source` against stdout and reports any diagnostics on stderr.
    pub fn interpret(&mut self, source: &str) -> InterpreterResult {
        let stdout = io::stdout();
        let mut out = stdout.lock();

        match self.interpret_with(source, &mut out) {
            Ok(()) => InterpreterResult::Ok,
            Err(err) => {
                eprintln!("{}", err);
                InterpreterResult::from(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use crate::{config::Config, error::LoxError};

    use super::{Interpreter, InterpreterResult};

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn output_of(interpreter: &mut Interpreter, source: &str) -> Result<String, LoxError> {
        let mut out = Vec::new();
        interpreter.interpret_with(source, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn prints_the_expression_value() {
        let mut interpreter = Interpreter::new();
        assert_eq!(output_of(&mut interpreter, "-(1 + 2) * 3").unwrap(), "-9\n");
        assert_eq!(output_of(&mut interpreter, "\"a\" + \"b\"").unwrap(), "ab\n");
    }

    #[test]
    fn failures_do_not_leak_into_the_next_source() {
        let mut interpreter = Interpreter::new();

        let err = output_of(&mut interpreter, "1 + nil").unwrap_err();
        assert_eq!(InterpreterResult::from(&err), InterpreterResult::RuntimeError);
        assert_eq!(err.exit_code(), 70);

        let err = output_of(&mut interpreter, "1 +").unwrap_err();
        assert_eq!(InterpreterResult::from(&err), InterpreterResult::CompileError);

        assert_eq!(output_of(&mut interpreter, "true").unwrap(), "true\n");
    }

    #[test]
    fn print_code_writes_disassembly_first() {
        let config = Config {
            print_code: true,
            trace_execution: false,
        };
        let mut interpreter = Interpreter::with_config(config);

        assert_eq!(
            output_of(&mut interpreter, "!nil").unwrap(),
            "== code ==\n0000    1 NIL\n0001    | NOT\n0002    | RETURN\ntrue\n"
        );
    }

    #[test]
    fn trace_goes_to_the_same_output() {
        let config = Config {
            print_code: false,
            trace_execution: true,
        };
        let mut interpreter = Interpreter::with_config(config);

        let output = output_of(&mut interpreter, "1 + 2").unwrap();
        assert!(output.contains("          [ 1 ][ 2 ]\n0004    | ADD\n"));
        assert!(output.ends_with("          [ 3 ]\n0005    | RETURN\n3\n"));
    }

    #[test]
    fn failed_disassembly_write_is_an_output_error() {
        let config = Config {
            print_code: true,
            trace_execution: false,
        };
        let mut interpreter = Interpreter::with_config(config);

        let err = interpreter.interpret_with("1", &mut ClosedPipe).unwrap_err();
        assert!(matches!(err, LoxError::Output(_)));
        assert!(!err.to_string().contains("[line"));
        assert_eq!(InterpreterResult::from(&err), InterpreterResult::IoError);
        assert_eq!(err.exit_code(), 74);
    }

    #[test]
    fn exit_codes() {
        let io = LoxError::Io {
            path: "missing.lox".into(),
            source: io::ErrorKind::NotFound.into(),
        };

        assert_eq!(InterpreterResult::Ok.exit_code(), 0);
        assert_eq!(InterpreterResult::CompileError.exit_code(), 65);
        assert_eq!(InterpreterResult::RuntimeError.exit_code(), 70);
        assert_eq!(InterpreterResult::from(&io), InterpreterResult::IoError);
        assert_eq!(InterpreterResult::from(&io).exit_code(), io.exit_code());
    }
}
