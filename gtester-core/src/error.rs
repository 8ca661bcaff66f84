//! Error types for gtester.

use crate::gen::GenId;
use thiserror::Error;

/// Main error type for gtester.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GTesterError {
    /// A generator was read before it produced any value.
    #[error("Generator {id} has not been generated yet")]
    Ungenerated { id: GenId },

    /// A handle that does not belong to the pool.
    #[error("Unknown generator {id}")]
    UnknownGenerator { id: GenId },

    /// Lower bound above upper bound at generation time.
    #[error("Invalid bounds: low {low} exceeds high {high}")]
    InvalidBounds { low: i64, high: i64 },

    /// A length generator produced a negative value.
    #[error("Invalid length: {length}")]
    InvalidLength { length: i64 },

    /// Character generation from an empty alphabet.
    #[error("Cannot draw a character from an empty alphabet")]
    EmptyAlphabet,

    /// A value had a different shape than the caller asked for.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// Argument index past the end of a test case.
    #[error("Missing argument {index} (test case has {len})")]
    MissingArgument { index: usize, len: usize },

    /// Differential run requested on a harness without a reference function.
    #[error("Harness has no reference function")]
    MissingReference,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Candidate or reference reported its own failure.
    #[error("{0}")]
    Candidate(String),
}

impl GTesterError {
    /// Shortcut for functions under test that want to fail a cycle.
    pub fn candidate(message: impl Into<String>) -> Self {
        GTesterError::Candidate(message.into())
    }
}

/// Result type for gtester operations.
pub type Result<T> = std::result::Result<T, GTesterError>;
