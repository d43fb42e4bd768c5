/// Error types for the Quire parser

use crate::span::Span;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    #[error("Unexpected {found}, expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("Mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedClose {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unterminated {what}")]
    Unterminated { what: String, span: Span },

    #[error("Invalid number literal '{text}'")]
    InvalidNumber { text: String, span: Span },
}

impl ParseError {
    pub fn unexpected(found: impl Into<String>, expected: impl Into<String>, span: Span) -> Self {
        ParseError::Unexpected {
            found: found.into(),
            expected: expected.into(),
            span,
        }
    }

    pub fn eof(expected: impl Into<String>, at: usize) -> Self {
        ParseError::UnexpectedEof {
            expected: expected.into(),
            span: Span::new(at, at),
        }
    }

    pub fn unterminated(what: impl Into<String>, span: Span) -> Self {
        ParseError::Unterminated {
            what: what.into(),
            span,
        }
    }

    /// Source span the error points at
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedEof { span, .. }
            | ParseError::Unexpected { span, .. }
            | ParseError::MismatchedClose { span, .. }
            | ParseError::Unterminated { span, .. }
            | ParseError::InvalidNumber { span, .. } => *span,
        }
    }
}
