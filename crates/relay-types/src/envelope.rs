//! The envelope: the atomic unit crossing every component boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TypesError};

/// Broadcast sentinel used as `to` when an envelope targets every attached agent.
pub const BROADCAST_TARGET: &str = "*";

/// The kind of an envelope, carried as the serde tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    /// A plain agent-to-agent message.
    Message,
    /// An action the sender performed (tool call, file edit, ...).
    Action,
    /// A self-reported state update.
    State,
    /// Internal reasoning, not meant for the addressee's task stream.
    Thinking,
    /// A consensus vote.
    Vote,
    /// A consensus proposal.
    Proposal,
    /// A daemon-originated system notice (e.g. an ack-required failure).
    System,
}

impl EnvelopeKind {
    /// Returns the outbound prefix kind this envelope kind is parsed from.
    pub fn is_relay_kind(self) -> bool {
        !matches!(self, EnvelopeKind::Thinking)
    }
}

/// Optional per-envelope delivery metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadMeta {
    /// The sender wants a system envelope back if delivery ultimately fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_ack: Option<bool>,
    /// Time-to-live in milliseconds; envelopes older than this at delivery time
    /// are dead-lettered with `reason = ttl_expired` instead of delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    /// The `id` of the envelope this one replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// The atomic unit crossing every component boundary (§3 of the spec).
///
/// `id` is assigned by the sender (or the wrapper on its behalf) and must be
/// globally unique for the lifetime of the store; `ts` is assigned by the
/// router on accept and is non-decreasing per sender on a single connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub ts: i64,
    pub from: String,
    pub to: String,
    pub kind: EnvelopeKind,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub is_broadcast: bool,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_meta: Option<PayloadMeta>,
}

fn default_importance() -> u8 {
    50
}

impl Envelope {
    /// Builds a new envelope with a freshly-generated id. `ts` must be
    /// assigned by the router on accept (`Envelope::with_ts`), not here,
    /// so construction stays pure and replayable.
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EnvelopeKind, body: impl Into<String>) -> Result<Self> {
        let to = to.into();
        let is_broadcast = to == BROADCAST_TARGET;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: 0,
            from: from.into(),
            to,
            kind,
            body: body.into(),
            topic: None,
            thread: None,
            data: None,
            is_broadcast,
            is_urgent: false,
            importance: default_importance(),
            payload_meta: None,
        })
    }

    /// Returns a copy of this envelope with `ts` set, as the router does on accept.
    #[must_use]
    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = ts;
        self
    }

    /// Sets the importance, validating the 0-100 range.
    pub fn with_importance(mut self, importance: u8) -> Result<Self> {
        if importance > 100 {
            return Err(TypesError::ImportanceOutOfRange(importance));
        }
        self.importance = importance;
        Ok(self)
    }

    /// The first eight hex characters of `id`, used in the injection line.
    pub fn short_id(&self) -> &str {
        let len = self.id.len().min(8);
        &self.id[..len]
    }

    /// Splits a `project:Target` address into `(project, target)`.
    pub fn split_cross_project_target(to: &str) -> (Option<&str>, &str) {
        match to.split_once(':') {
            Some((project, target)) if !project.is_empty() && !target.is_empty() => {
                (Some(project), target)
            }
            _ => (None, to),
        }
    }

    /// Splits a `project:thread` qualified thread into `(project, thread)`.
    pub fn split_cross_project_thread(thread: &str) -> (Option<&str>, &str) {
        Self::split_cross_project_target(thread)
    }

    /// Whether this envelope has expired per its TTL, relative to `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.payload_meta.as_ref().and_then(|m| m.ttl_ms) {
            Some(ttl) => now_ms.saturating_sub(self.ts) > ttl as i64,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_envelope_detects_broadcast() {
        let env = Envelope::new("Lead", "*", EnvelopeKind::Message, "status report").unwrap();
        assert!(env.is_broadcast);
        assert_eq!(env.to, BROADCAST_TARGET);
    }

    #[test]
    fn short_id_is_eight_chars() {
        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap();
        assert_eq!(env.short_id().len(), 8);
    }

    #[test]
    fn importance_out_of_range_rejected() {
        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap();
        assert!(env.with_importance(101).is_err());
    }

    #[test]
    fn cross_project_target_splits() {
        assert_eq!(
            Envelope::split_cross_project_target("backend:Dev"),
            (Some("backend"), "Dev")
        );
        assert_eq!(Envelope::split_cross_project_target("Dev"), (None, "Dev"));
    }

    #[test]
    fn ttl_expiry_is_relative_to_ts() {
        let mut env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi")
            .unwrap()
            .with_ts(1_000);
        env.payload_meta = Some(PayloadMeta {
            requires_ack: None,
            ttl_ms: Some(500),
            reply_to: None,
        });
        assert!(!env.is_expired(1_400));
        assert!(env.is_expired(1_600));
    }

    #[test]
    fn serde_roundtrip_preserves_kind_tag() {
        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Vote, "approve").unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"kind\":\"vote\""));
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, EnvelopeKind::Vote);
    }
}
