//! `StoredMessage`: an envelope plus its delivery state inside the store.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Read/unread status of a stored message, from the recipient's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Unread,
    Read,
}

/// An envelope as persisted by the message store, with the delivery
/// bookkeeping the store itself is responsible for (§3 `StoredMessage`).
///
/// The only legal status transition is `Unread -> Read`; a message is never
/// deleted except by the retention sweep or a session cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl StoredMessage {
    /// Wraps a just-accepted envelope as a fresh, unread stored message.
    pub fn new(envelope: Envelope, session_id: Option<String>) -> Self {
        Self {
            envelope,
            status: MessageStatus::Unread,
            delivery_seq: None,
            delivery_session_id: None,
            session_id,
        }
    }

    /// Applies the one legal status transition, `Unread -> Read`.
    ///
    /// A second call is a no-op: marking an already-read message read again
    /// is not an error, it just doesn't regress the status.
    pub fn mark_read(&mut self) {
        self.status = MessageStatus::Read;
    }

    pub fn id(&self) -> &str {
        &self.envelope.id
    }
}

/// Parameters accepted by `MessageStore::get_messages`.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub topic: Option<String>,
    pub thread: Option<String>,
    pub since_ts: Option<i64>,
    pub unread_only: bool,
    pub urgent_only: bool,
    pub ascending: bool,
    pub limit: usize,
}

impl MessageFilter {
    pub const DEFAULT_LIMIT: usize = 200;
}

impl MessageFilter {
    pub fn new() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeKind;

    #[test]
    fn mark_read_transitions_once() {
        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap();
        let mut stored = StoredMessage::new(env, None);
        assert_eq!(stored.status, MessageStatus::Unread);
        stored.mark_read();
        assert_eq!(stored.status, MessageStatus::Read);
        stored.mark_read();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[test]
    fn default_filter_uses_default_limit() {
        let filter = MessageFilter::new();
        assert_eq!(filter.limit, MessageFilter::DEFAULT_LIMIT);
        assert!(!filter.ascending);
    }
}
