//! Error types for planefem-expr

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExprError>;

/// Errors raised while compiling an expression.
///
/// Positions are byte offsets into the source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Empty expression")]
    Empty,

    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Invalid number '{text}' at position {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("Unknown identifier '{name}' at position {pos}")]
    UnknownIdentifier { name: String, pos: usize },

    #[error("Function '{name}' takes {expected} argument(s) but {found} were given (position {pos})")]
    Arity {
        name: String,
        expected: String,
        found: usize,
        pos: usize,
    },

    #[error("Unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unclosed parenthesis opened at position {pos}")]
    UnclosedParen { pos: usize },

    #[error("Expression nested too deeply at position {pos}")]
    TooDeep { pos: usize },
}
