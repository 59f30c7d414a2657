//! Spawner error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("agent {0} is already live")]
    NameCollision(String),

    #[error("no executable found for cli {0}")]
    ExecutableNotFound(String),

    #[error("wrapper for {0} did not register within {timeout_s}s")]
    RegistrationTimeout { name: String, timeout_s: u64 },

    #[error("pty error: {0}")]
    Pty(#[from] relay_pty::PtyError),

    #[error("primary agent {0} not found for shadow spawn")]
    PrimaryNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workers file serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpawnError>;
