//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A row could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing RocksDB instance reported an error.
    #[error("rocksdb error: {0}")]
    Backend(String),

    /// A filter or query parameter was invalid.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A column family/table the backend expects was missing. Indicates a
    /// backend opened against a database that predates a schema addition
    /// and was not migrated.
    #[error("missing column family: {0}")]
    MissingColumnFamily(String),
}

/// A specialized Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
