use std::{
    fmt::{self, Display, Formatter},
    io,
    path::PathBuf,
};

use thiserror::Error;

use crate::opcodes::Line;

/// Where a compile error points in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    At(String),
    AtEnd,
    /// Lexical errors carry their own message and no lexeme.
    Lexical,
}

impl Display for ErrorLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::At(lexeme) => write!(f, " at '{}'", lexeme),
            ErrorLocation::AtEnd => write!(f, " at end"),
            ErrorLocation::Lexical => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct CompileError {
    pub line: Line,
    pub location: ErrorLocation,
    pub message: String,
}

/// Every error reported while compiling one source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_lines(.0))]
pub struct CompileErrors(pub Vec<CompileError>);

fn join_lines(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(|error| error.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Stack underflow.")]
    StackUnderflow,
    #[error("Unknown opcode {0}.")]
    UnknownOpcode(u8),
    #[error("Unexpected end of bytecode.")]
    UnexpectedEndOfChunk,
    #[error("Missing constant {0}.")]
    MissingConstant(u8),
    #[error("Could not write result: {0}.")]
    Output(io::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind}\n[line {line}] in script")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: Line,
}

#[derive(Debug, Error)]
pub enum LoxError {
    #[error("Could not open file \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not write output: {0}")]
    Output(#[source] io::Error),
    #[error(transparent)]
    Compile(#[from] CompileErrors),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LoxError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Compile(_) => 65,
            LoxError::Runtime(_) => 70,
            LoxError::Io { .. } | LoxError::Output(_) => 74,
        }
    }
}
