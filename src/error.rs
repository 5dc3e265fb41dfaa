//! Unified error type for every fallible stage of the pipeline.
//!
//! Mirrors the four error kinds from the original design: syntax, parser,
//! semantic, and internal. An internal error means the encoder could not
//! find a legalization for some operand shape — a compiler bug, not a
//! user error — so it gets its own variant rather than a generic message.

use std::fmt;

/// A source location, attached to syntax/parser/semantic errors.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Location {
    pub file: String,
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("{location}: syntax error: {message}")]
    Syntax { location: Location, message: String },

    #[error("{location}: parse error: expected {expected}, got {got}")]
    Parser {
        location: Location,
        expected: String,
        got: String,
    },

    #[error("{location}: {message}")]
    Semantic { location: Location, message: String },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            location,
            message: message.into(),
        }
    }

    pub fn parser(location: Location, expected: impl Into<String>, got: impl Into<String>) -> Self {
        CompileError::Parser {
            location,
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn semantic(location: Location, message: impl Into<String>) -> Self {
        CompileError::Semantic {
            location,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }

    /// Location of the error, if it carries one (internal errors don't).
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::Syntax { location, .. }
            | CompileError::Parser { location, .. }
            | CompileError::Semantic { location, .. } => Some(location),
            CompileError::Internal { .. } => None,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
