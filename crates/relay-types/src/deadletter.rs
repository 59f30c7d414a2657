//! Dead letters: envelopes recorded as undeliverable.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Why a delivery ultimately failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// The wrapper retried injection to its configured limit without verification.
    MaxRetriesExceeded,
    /// The envelope's TTL elapsed before it could be delivered.
    TtlExpired,
    /// The target wrapper vanished mid-injection.
    ConnectionLost,
    /// No wrapper is currently attached under that name.
    TargetNotFound,
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeadLetterReason::MaxRetriesExceeded => "max_retries_exceeded",
            DeadLetterReason::TtlExpired => "ttl_expired",
            DeadLetterReason::ConnectionLost => "connection_lost",
            DeadLetterReason::TargetNotFound => "target_not_found",
        };
        f.write_str(s)
    }
}

/// A failed delivery, recorded verbatim for operator inspection (§3 `DeadLetter`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: String,
    pub envelope: Envelope,
    pub reason: DeadLetterReason,
    pub attempt_count: u32,
    pub error_message: Option<String>,
    pub dead_at: i64,
}

impl DeadLetter {
    pub fn new(
        envelope: Envelope,
        reason: DeadLetterReason,
        attempt_count: u32,
        error_message: Option<String>,
        dead_at: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            envelope,
            reason,
            attempt_count,
            error_message,
            dead_at,
        }
    }
}

/// Filter parameters for listing dead letters by reason and age.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterFilter {
    pub reason: Option<DeadLetterReason>,
    pub before_ts: Option<i64>,
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeKind;

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(
            DeadLetterReason::TargetNotFound.to_string(),
            "target_not_found"
        );
        assert_eq!(
            DeadLetterReason::MaxRetriesExceeded.to_string(),
            "max_retries_exceeded"
        );
    }

    #[test]
    fn dead_letter_denormalizes_envelope() {
        let env = Envelope::new("Lead", "Ghost", EnvelopeKind::Message, "hi").unwrap();
        let dl = DeadLetter::new(env.clone(), DeadLetterReason::TargetNotFound, 0, None, 123);
        assert_eq!(dl.envelope.id, env.id);
        assert_eq!(dl.attempt_count, 0);
    }
}
