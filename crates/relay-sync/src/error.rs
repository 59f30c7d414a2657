//! Cloud sync queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("batch exhausted retries without a successful POST")]
    Exhausted,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
