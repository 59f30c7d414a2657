//! The durable message store (C1, §4.5): append, query, retention,
//! session accounting, agent summaries.

use std::sync::Arc;

use relay_types::{
    AgentSummary, ClosedBy, MessageFilter, Session, SessionFilter, StoredMessage,
};

use crate::error::{Result, StorageError};
use crate::traits::StoreBackend;

const TABLE_MESSAGES: &str = "messages";
const TABLE_SESSIONS: &str = "sessions";
const TABLE_SUMMARIES: &str = "summaries";

const PRIMARY_PREFIX: &[u8] = b"primary:";
const ID_INDEX_PREFIX: &[u8] = b"idx:id:";

/// Statistics reported by `MessageStore::stats`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub message_count: u64,
    pub session_count: u64,
    pub backend_reads: u64,
    pub backend_writes: u64,
}

/// Builds the primary key for a message: `primary:<ts big-endian><id>`.
///
/// Timestamps are assumed non-negative (millisecond epoch time), so the raw
/// big-endian encoding of the `i64` as a `u64` sorts the same as the
/// timestamps themselves — this is what gives `scan_prefix` ts-ordered
/// iteration for free instead of needing a secondary sort pass.
fn primary_key(ts: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(PRIMARY_PREFIX.len() + 8 + id.len());
    key.extend_from_slice(PRIMARY_PREFIX);
    key.extend_from_slice(&(ts as u64).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

fn id_index_key(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_INDEX_PREFIX.len() + id.len());
    key.extend_from_slice(ID_INDEX_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Durable append-only log plus session and agent-summary rows, generic
/// over any [`StoreBackend`] (§4.5 "backend plurality").
pub struct MessageStore<B: StoreBackend> {
    backend: Arc<B>,
    retention_ms: i64,
}

impl<B: StoreBackend> MessageStore<B> {
    pub fn new(backend: Arc<B>, retention_ms: i64) -> Self {
        Self {
            backend,
            retention_ms,
        }
    }

    /// Appends a new message. The secondary id-index row lets
    /// `get_message_by_id` resolve a prefix without a full table scan.
    pub fn save_message(&self, message: &StoredMessage) -> Result<()> {
        let key = primary_key(message.envelope.ts, &message.envelope.id);
        let value = serde_json::to_vec(message)?;
        self.backend.put(TABLE_MESSAGES, &key, &value)?;
        self.backend
            .put(TABLE_MESSAGES, &id_index_key(&message.envelope.id), &key)?;
        Ok(())
    }

    /// Returns messages matching `filter`, newest-or-oldest first per
    /// `filter.ascending`, capped at `filter.limit` (default 200).
    pub fn get_messages(&self, filter: &MessageFilter) -> Result<Vec<StoredMessage>> {
        let rows = self.backend.scan_prefix(TABLE_MESSAGES, PRIMARY_PREFIX)?;
        let mut matched = Vec::new();
        for (_key, value) in rows {
            let message: StoredMessage = serde_json::from_slice(&value)?;
            if !matches_filter(&message, filter) {
                continue;
            }
            matched.push(message);
        }
        // Rows from scan_prefix are already ts-ascending; only reverse when
        // the caller actually wants descending order.
        if !filter.ascending {
            matched.reverse();
        }
        let limit = if filter.limit == 0 {
            MessageFilter::DEFAULT_LIMIT
        } else {
            filter.limit
        };
        matched.truncate(limit);
        Ok(matched)
    }

    /// Marks the message `id` read. This is the one legal status
    /// transition (`unread -> read`) and the only place it happens — the
    /// store never flips status implicitly on read-query (see DESIGN.md).
    pub fn update_message_status(&self, id: &str) -> Result<()> {
        let pointer = self
            .backend
            .get(TABLE_MESSAGES, &id_index_key(id))?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let raw = self
            .backend
            .get(TABLE_MESSAGES, &pointer)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let mut message: StoredMessage = serde_json::from_slice(&raw)?;
        message.mark_read();
        let value = serde_json::to_vec(&message)?;
        self.backend.put(TABLE_MESSAGES, &pointer, &value)?;
        Ok(())
    }

    /// Looks up a message by its exact id or an unambiguous id prefix
    /// (e.g. the 8-character `short_id`), returning the most recent match.
    pub fn get_message_by_id(&self, id_or_prefix: &str) -> Result<Option<StoredMessage>> {
        let mut prefix_key = Vec::with_capacity(ID_INDEX_PREFIX.len() + id_or_prefix.len());
        prefix_key.extend_from_slice(ID_INDEX_PREFIX);
        prefix_key.extend_from_slice(id_or_prefix.as_bytes());

        let candidates = self.backend.scan_prefix(TABLE_MESSAGES, &prefix_key)?;
        let mut best: Option<StoredMessage> = None;
        for (_idx_key, pointer) in candidates {
            if let Some(raw) = self.backend.get(TABLE_MESSAGES, &pointer)? {
                let message: StoredMessage = serde_json::from_slice(&raw)?;
                if best.as_ref().map(|b| message.envelope.ts > b.envelope.ts).unwrap_or(true) {
                    best = Some(message);
                }
            }
        }
        Ok(best)
    }

    pub fn start_session(&self, session: &Session) -> Result<()> {
        let value = serde_json::to_vec(session)?;
        self.backend
            .put(TABLE_SESSIONS, session.id.as_bytes(), &value)
    }

    /// Ends a session, preserving any already-set summary when
    /// `new_summary` is `None` (see `Session::end`).
    pub fn end_session(
        &self,
        session_id: &str,
        ended_at: i64,
        closed_by: ClosedBy,
        new_summary: Option<String>,
    ) -> Result<()> {
        let raw = self
            .backend
            .get(TABLE_SESSIONS, session_id.as_bytes())?
            .ok_or_else(|| StorageError::NotFound(session_id.to_string()))?;
        let mut session: Session = serde_json::from_slice(&raw)?;
        session.end(ended_at, closed_by, new_summary);
        let value = serde_json::to_vec(&session)?;
        self.backend.put(TABLE_SESSIONS, session_id.as_bytes(), &value)
    }

    pub fn increment_session_message_count(&self, session_id: &str) -> Result<()> {
        let raw = self
            .backend
            .get(TABLE_SESSIONS, session_id.as_bytes())?
            .ok_or_else(|| StorageError::NotFound(session_id.to_string()))?;
        let mut session: Session = serde_json::from_slice(&raw)?;
        session.increment_message_count();
        let value = serde_json::to_vec(&session)?;
        self.backend.put(TABLE_SESSIONS, session_id.as_bytes(), &value)
    }

    pub fn get_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let rows = self.backend.scan_all(TABLE_SESSIONS)?;
        let mut sessions = Vec::new();
        for (_key, value) in rows {
            let session: Session = serde_json::from_slice(&value)?;
            if let Some(ref agent_name) = filter.agent_name {
                if &session.agent_name != agent_name {
                    continue;
                }
            }
            if let Some(ref project_id) = filter.project_id {
                if session.project_id.as_ref() != Some(project_id) {
                    continue;
                }
            }
            if filter.active_only && session.is_ended() {
                continue;
            }
            sessions.push(session);
        }
        Ok(sessions)
    }

    pub fn save_agent_summary(&self, summary: &AgentSummary) -> Result<()> {
        let value = serde_json::to_vec(summary)?;
        self.backend
            .put(TABLE_SUMMARIES, summary.agent_name.as_bytes(), &value)
    }

    pub fn get_agent_summary(&self, agent_name: &str) -> Result<Option<AgentSummary>> {
        match self.backend.get(TABLE_SUMMARIES, agent_name.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_agent_summaries(&self) -> Result<Vec<AgentSummary>> {
        let rows = self.backend.scan_all(TABLE_SUMMARIES)?;
        rows.into_iter()
            .map(|(_key, value)| Ok(serde_json::from_slice(&value)?))
            .collect()
    }

    /// Deletes every message older than the configured retention window,
    /// returning the number removed.
    pub fn cleanup_expired_messages(&self, now_ms: i64) -> Result<u64> {
        let cutoff = now_ms.saturating_sub(self.retention_ms);
        let rows = self.backend.scan_prefix(TABLE_MESSAGES, PRIMARY_PREFIX)?;
        let mut deleted = 0u64;
        for (key, value) in rows {
            let message: StoredMessage = serde_json::from_slice(&value)?;
            if message.envelope.ts < cutoff {
                self.backend.delete(TABLE_MESSAGES, &key)?;
                self.backend
                    .delete(TABLE_MESSAGES, &id_index_key(&message.envelope.id))?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let backend_stats = self.backend.stats();
        let message_count = self
            .backend
            .scan_prefix(TABLE_MESSAGES, PRIMARY_PREFIX)?
            .len() as u64;
        let session_count = self.backend.scan_all(TABLE_SESSIONS)?.len() as u64;
        Ok(StoreStats {
            message_count,
            session_count,
            backend_reads: backend_stats.reads,
            backend_writes: backend_stats.writes,
        })
    }
}

fn matches_filter(message: &StoredMessage, filter: &MessageFilter) -> bool {
    if let Some(ref from) = filter.from {
        if &message.envelope.from != from {
            return false;
        }
    }
    if let Some(ref to) = filter.to {
        if &message.envelope.to != to {
            return false;
        }
    }
    if let Some(ref topic) = filter.topic {
        if message.envelope.topic.as_ref() != Some(topic) {
            return false;
        }
    }
    if let Some(ref thread) = filter.thread {
        if message.envelope.thread.as_ref() != Some(thread) {
            return false;
        }
    }
    if let Some(since_ts) = filter.since_ts {
        if message.envelope.ts < since_ts {
            return false;
        }
    }
    if filter.unread_only && message.status != relay_types::MessageStatus::Unread {
        return false;
    }
    if filter.urgent_only && !message.envelope.is_urgent {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_backend::InMemoryBackend;
    use relay_types::{Envelope, EnvelopeKind};

    fn store() -> MessageStore<InMemoryBackend> {
        MessageStore::new(Arc::new(InMemoryBackend::new()), 7 * 24 * 60 * 60 * 1000)
    }

    fn msg(ts: i64, from: &str, to: &str, body: &str) -> StoredMessage {
        let env = Envelope::new(from, to, EnvelopeKind::Message, body)
            .unwrap()
            .with_ts(ts);
        StoredMessage::new(env, None)
    }

    #[test]
    fn get_messages_respects_descending_default_and_limit() {
        let store = store();
        for i in 0..5 {
            store.save_message(&msg(i, "Lead", "Dev", "hi")).unwrap();
        }
        let mut filter = MessageFilter::new();
        filter.limit = 3;
        let got = store.get_messages(&filter).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].envelope.ts, 4);
        assert_eq!(got[2].envelope.ts, 2);
    }

    #[test]
    fn get_message_by_id_matches_prefix_and_picks_latest() {
        let store = store();
        let older = msg(0, "Lead", "Dev", "first");
        let mut newer = msg(10, "Lead", "Dev", "second");
        newer.envelope.id = format!("{}-extra", &older.envelope.id[..8]);
        store.save_message(&older).unwrap();
        store.save_message(&newer).unwrap();

        let found = store
            .get_message_by_id(&older.envelope.id[..8])
            .unwrap()
            .unwrap();
        assert_eq!(found.envelope.ts, 10);
    }

    #[test]
    fn update_message_status_marks_read() {
        let store = store();
        let message = msg(0, "Lead", "Dev", "hi");
        store.save_message(&message).unwrap();
        store.update_message_status(&message.envelope.id).unwrap();

        let mut filter = MessageFilter::new();
        filter.unread_only = true;
        assert!(store.get_messages(&filter).unwrap().is_empty());
    }

    #[test]
    fn cleanup_expired_messages_respects_retention() {
        let store = MessageStore::new(Arc::new(InMemoryBackend::new()), 1000);
        store.save_message(&msg(0, "Lead", "Dev", "old")).unwrap();
        store.save_message(&msg(5000, "Lead", "Dev", "new")).unwrap();
        let deleted = store.cleanup_expired_messages(6000).unwrap();
        assert_eq!(deleted, 1);
        let remaining = store.get_messages(&MessageFilter::new()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].envelope.body, "new");
    }

    #[test]
    fn end_session_preserves_summary_through_store() {
        let store = store();
        let session = Session::start("s1", "Dev", "claude", None, None, 0);
        store.start_session(&session).unwrap();
        store
            .end_session("s1", 100, ClosedBy::Agent, Some("did things".into()))
            .unwrap();
        store.end_session("s1", 200, ClosedBy::Error, None).unwrap();

        let sessions = store.get_sessions(&SessionFilter::default()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].ended_at, Some(100));
        assert_eq!(sessions[0].summary.as_deref(), Some("did things"));
    }
}
