//! Error types for the router.

use thiserror::Error;

/// Errors the router can produce.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No agent is currently attached under this name.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// The target was attached when delivery began but vanished before
    /// injection completed (race with `unregister`).
    #[error("connection lost mid-delivery: {0}")]
    ConnectionLost(String),

    /// The wrapper's injection path ran out of retries without verifying.
    #[error("delivery not verified after retries: {0}")]
    MaxRetriesExceeded(String),

    /// The envelope's TTL had already elapsed by delivery time.
    #[error("envelope ttl expired: {0}")]
    TtlExpired(String),

    /// Envelope-signature verification failed; treated as forgery, not a
    /// retriable failure (§4.3, §7 — no delivery, no dead letter).
    #[error("signature verification failed for envelope {0}")]
    SignatureInvalid(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
