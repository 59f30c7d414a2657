//! Shared error types for the data model.

use thiserror::Error;

/// Errors raised while constructing or validating core types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// An agent name failed the PascalCase / length validator.
    #[error("invalid agent name: {0}")]
    InvalidAgentName(String),

    /// A thread identifier was malformed.
    #[error("invalid thread id: {0}")]
    InvalidThread(String),

    /// Importance must be in 0..=100.
    #[error("importance {0} out of range (0-100)")]
    ImportanceOutOfRange(u8),
}

/// Result type used throughout `relay-types`.
pub type Result<T> = std::result::Result<T, TypesError>;
