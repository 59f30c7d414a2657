//! Adapters wiring the message store, dead-letter queue, and sync queue
//! into the router's `EnvelopeSink`/`DeadLetterSink`/`SessionSink` hooks.
//! The router knows nothing about storage; these structs are the only
//! place that dependency is allowed to cross.

use std::sync::Arc;

use relay_router::{DeadLetterSink, EnvelopeSink, SessionSink};
use relay_storage::{DeadLetterStore, MessageStore, StoreBackend};
use relay_types::{ClosedBy, DeadLetter, DeadLetterReason, Envelope, SessionFilter, StoredMessage};
use tracing::warn;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Persists every accepted envelope as an unread [`StoredMessage`] (§4.5).
pub struct StoreEnvelopeSink<B: StoreBackend> {
    store: Arc<MessageStore<B>>,
}

impl<B: StoreBackend> StoreEnvelopeSink<B> {
    pub fn new(store: Arc<MessageStore<B>>) -> Self {
        Self { store }
    }
}

impl<B: StoreBackend> EnvelopeSink for StoreEnvelopeSink<B> {
    fn on_accepted(&self, envelope: &Envelope) {
        let message = StoredMessage::new(envelope.clone(), None);
        if let Err(err) = self.store.save_message(&message) {
            warn!(%err, envelope_id = %envelope.id, "failed to persist accepted envelope");
        }
    }
}

/// Fans an accepted envelope out to every configured sink (the message
/// store always, the cloud sync queue only when enabled).
pub struct CompositeEnvelopeSink {
    sinks: Vec<Arc<dyn EnvelopeSink>>,
}

impl CompositeEnvelopeSink {
    pub fn new(sinks: Vec<Arc<dyn EnvelopeSink>>) -> Self {
        Self { sinks }
    }
}

impl EnvelopeSink for CompositeEnvelopeSink {
    fn on_accepted(&self, envelope: &Envelope) {
        for sink in &self.sinks {
            sink.on_accepted(envelope);
        }
    }

    fn on_delivered(&self, envelope: &Envelope, recipient: &str, delivery_seq: u64) {
        for sink in &self.sinks {
            sink.on_delivered(envelope, recipient, delivery_seq);
        }
    }
}

/// Records every failed delivery as a [`DeadLetter`] row (§4.6).
pub struct StoreDeadLetterSink<B: StoreBackend> {
    dlq: Arc<DeadLetterStore<B>>,
}

impl<B: StoreBackend> StoreDeadLetterSink<B> {
    pub fn new(dlq: Arc<DeadLetterStore<B>>) -> Self {
        Self { dlq }
    }
}

impl<B: StoreBackend> DeadLetterSink for StoreDeadLetterSink<B> {
    fn on_dead_letter(
        &self,
        envelope: &Envelope,
        reason: DeadLetterReason,
        attempt_count: u32,
        error_message: &str,
    ) {
        let error_message = (!error_message.is_empty()).then(|| error_message.to_string());
        let dead_letter = DeadLetter::new(envelope.clone(), reason, attempt_count, error_message, now_ms());
        if let Err(err) = self.dlq.record(&dead_letter) {
            warn!(%err, envelope_id = %envelope.id, "failed to record dead letter");
        }
    }
}

/// Closes every still-active session for a displaced agent name (§4.3
/// invariant: a newer registration closes the older connection's session
/// with `closed_by = disconnect`).
pub struct StoreSessionSink<B: StoreBackend> {
    store: Arc<MessageStore<B>>,
}

impl<B: StoreBackend> StoreSessionSink<B> {
    pub fn new(store: Arc<MessageStore<B>>) -> Self {
        Self { store }
    }
}

impl<B: StoreBackend> SessionSink for StoreSessionSink<B> {
    fn on_displaced(&self, agent_name: &str) {
        let filter = SessionFilter {
            agent_name: Some(agent_name.to_string()),
            active_only: true,
            ..SessionFilter::default()
        };
        let sessions = match self.store.get_sessions(&filter) {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(%err, agent = %agent_name, "failed to look up sessions for displaced agent");
                return;
            }
        };
        for session in sessions {
            if let Err(err) = self.store.end_session(&session.id, now_ms(), ClosedBy::Disconnect, None) {
                warn!(%err, session_id = %session.id, "failed to close session for displaced agent");
            }
        }
    }
}
