//! Error types for every pipeline stage: lexing, parsing, and evaluation.
//!
//! Keeping the three stages distinct (rather than one big error enum) lets a
//! host match on `EngineError::Lex`/`Parse`/`Runtime` without string
//! matching, mirroring how `ouros` separates `ParseError`/`CompileError`/
//! `Exception`/`ResourceError` in its own `ReplError`.

use std::fmt;

/// A single lexer failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {line}:{column}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// A single parser failure. Always carries the position of the offending
/// token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {line}:{column}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("unexpected end of input")]
    UnexpectedEof,
}

/// A runtime failure raised during evaluation.
///
/// Unlike `LexError`/`ParseError`, the failing AST node may not carry a line
/// (e.g. a synthesized default value), so `line` is optional per `spec.md`
/// §7.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: Option<u32>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: Option<u32>) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("undefined identifier '{0}'")]
    UndefinedIdentifier(String),
    #[error("unknown class '{0}'")]
    UnknownClass(String),
    #[error("null handle dereference")]
    NullHandleDereference,
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("array index out of bounds: {index} (length {length})")]
    IndexOutOfBounds { index: i64, length: usize },
    #[error("unknown member '{0}'")]
    UnknownMember(String),
    #[error("value is not callable")]
    NotCallable,
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("maximum call depth ({0}) exceeded")]
    RecursionLimitExceeded(u32),
    #[error("{0}")]
    Host(String),
}

/// Top-level error returned by `Engine::load`/`Engine::call`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Non-error control-flow carrier. Distinct from the error types above —
/// `Break`/`Continue`/`Return` are always caught by an enclosing construct
/// and never surface to the host as failures (`spec.md` §7, §9).
///
/// Every statement evaluator returns `Result<Flow, RuntimeError>` rather than
/// throwing; the caller inspects `Flow` to decide whether to keep executing
/// or unwind. This is the "thread a result kind through evaluation" strategy
/// `spec.md` §9 recommends in place of the source's exception-based control
/// flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(crate::value::Value),
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Break => write!(f, "break"),
            Self::Continue => write!(f, "continue"),
            Self::Return(_) => write!(f, "return"),
        }
    }
}
