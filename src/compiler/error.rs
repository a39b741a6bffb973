//! Compile-time error taxonomy.
//!
//! All compiler errors are fatal: there is no recovery, and the driver's
//! only job with one is to print it and exit non-zero. Mirrors the
//! hand-rolled error-enum-plus-manual-`Display` shape the teacher uses for
//! `vm::bytecode::BytecodeError` rather than reaching for an error crate.

use std::fmt;
use std::io;

#[derive(Debug, Clone)]
pub enum CompileError {
    /// Unterminated string, invalid escape, or other lexical problem.
    LexError { message: String, file: String, line: usize, column: usize },
    /// Unexpected token or unexpected end of file while parsing.
    ParseError { message: String, file: String, line: usize, column: usize },
    /// Two functions/lets/types share the same signature-ident or name.
    DuplicateDefinition { what: String },
    /// An ident or call targets an undefined let/fun/type.
    UnknownReference { what: String },
    /// `__start(:)` is absent.
    MissingStart,
    /// `__start(:)` exists but is inline, asm, or not `unsafe`.
    StartInvalid { reason: &'static str },
    /// An option combination violates the rules in §4.2.
    OptionConflict { fun_ident: String, reason: &'static str },
    /// A non-unsafe function calls an unsafe function.
    UnsafeCall { caller: String, callee: String },
    /// An `inline` function transitively inlines itself.
    InlineCycle { fun_ident: String },
    /// The type checker rejected a function, let, or `if` branch.
    StackMismatch { context: String, detail: String },
    /// A malformed literal: missing/invalid suffix, out-of-range value,
    /// a char literal that isn't exactly one byte, or a global let with
    /// zero or more than one initializing expression.
    InvalidLiteral { literal: String, detail: String },
    /// An `asm` function body names an opcode mnemonic that doesn't exist.
    UnknownInst { mnemonic: String, fun_ident: String },
    /// Propagated file I/O failure (reading source, writing the image).
    Io(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::LexError { message, file, line, column } => {
                write!(f, "error: {}\n  --> {}:{}:{}", message, file, line, column)
            }
            CompileError::ParseError { message, file, line, column } => {
                write!(f, "error: {}\n  --> {}:{}:{}", message, file, line, column)
            }
            CompileError::DuplicateDefinition { what } => {
                write!(f, "error: duplicate definition of '{}'", what)
            }
            CompileError::UnknownReference { what } => {
                write!(f, "error: unknown reference '{}'", what)
            }
            CompileError::MissingStart => {
                write!(f, "error: no '__start(:)' function found")
            }
            CompileError::StartInvalid { reason } => {
                write!(f, "error: '__start(:)' is invalid: {}", reason)
            }
            CompileError::OptionConflict { fun_ident, reason } => {
                write!(f, "error: fun '{}' has conflicting options: {}", fun_ident, reason)
            }
            CompileError::UnsafeCall { caller, callee } => {
                write!(
                    f,
                    "error: non-unsafe fun '{}' calls unsafe fun '{}'",
                    caller, callee
                )
            }
            CompileError::InlineCycle { fun_ident } => {
                write!(f, "error: inline recursion cycle through '{}'", fun_ident)
            }
            CompileError::StackMismatch { context, detail } => {
                write!(f, "error: {} does not have a valid stack: {}", context, detail)
            }
            CompileError::InvalidLiteral { literal, detail } => {
                write!(f, "error: invalid literal '{}': {}", literal, detail)
            }
            CompileError::UnknownInst { mnemonic, fun_ident } => {
                write!(
                    f,
                    "error: unknown instruction '{}' in asm fun '{}'",
                    mnemonic, fun_ident
                )
            }
            CompileError::Io(message) => write!(f, "error: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<io::Error> for CompileError {
    fn from(e: io::Error) -> Self {
        CompileError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
