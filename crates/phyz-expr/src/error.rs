//! Error types for phyz-expr.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unbound symbol '{0}' in numeric compilation")]
    UnboundSymbol(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("undefined value: {0}")]
    Undefined(String),

    /// An exact coefficient or exponent left the range of `i64`.
    #[error("rational overflow in exact arithmetic")]
    Overflow,

    #[error("expression too complex: {terms} terms exceeds limit of {limit}")]
    TooComplex { terms: usize, limit: usize },

    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("non-finite value while evaluating {0}")]
    NonFinite(String),
}

pub type Result<T> = std::result::Result<T, ExprError>;
