//! PTY wrapper error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to spawn pty process: {0}")]
    Spawn(String),

    #[error("pty write failed: {0}")]
    Write(String),

    #[error("injection not verified after {attempts} attempts")]
    InjectionFailed { attempts: u32 },

    #[error("wrapper for {0} is not running")]
    NotRunning(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;
