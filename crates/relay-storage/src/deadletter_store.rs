//! The dead-letter queue (C2, §4.6): append-only log of delivery failures,
//! sharing the message store's backend plurality.

use std::sync::Arc;

use relay_types::{DeadLetter, DeadLetterFilter};

use crate::error::Result;
use crate::traits::StoreBackend;

const TABLE: &str = "deadletters";
const PRIMARY_PREFIX: &[u8] = b"primary:";

fn primary_key(dead_at: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(PRIMARY_PREFIX.len() + 8 + id.len());
    key.extend_from_slice(PRIMARY_PREFIX);
    key.extend_from_slice(&(dead_at as u64).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

/// Append-only log of undeliverable envelopes. There is no automatic
/// redelivery loop (§4.6) — `relay-cli` exposes a manual requeue that
/// re-submits through the router.
pub struct DeadLetterStore<B: StoreBackend> {
    backend: Arc<B>,
}

impl<B: StoreBackend> DeadLetterStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn record(&self, dead_letter: &DeadLetter) -> Result<()> {
        let key = primary_key(dead_letter.dead_at, &dead_letter.id);
        let value = serde_json::to_vec(dead_letter)?;
        self.backend.put(TABLE, &key, &value)
    }

    /// Lists dead letters newest-first, filtered by reason and/or age, up
    /// to `filter.limit` rows (0 means unlimited).
    pub fn list(&self, filter: &DeadLetterFilter) -> Result<Vec<DeadLetter>> {
        let rows = self.backend.scan_prefix(TABLE, PRIMARY_PREFIX)?;
        let mut matched = Vec::new();
        for (_key, value) in rows {
            let dead_letter: DeadLetter = serde_json::from_slice(&value)?;
            if let Some(reason) = filter.reason {
                if dead_letter.reason != reason {
                    continue;
                }
            }
            if let Some(before_ts) = filter.before_ts {
                if dead_letter.dead_at >= before_ts {
                    continue;
                }
            }
            matched.push(dead_letter);
        }
        matched.reverse();
        if filter.limit > 0 {
            matched.truncate(filter.limit);
        }
        Ok(matched)
    }

    /// Deletes dead letters matching `filter`, returning the count removed.
    pub fn purge(&self, filter: &DeadLetterFilter) -> Result<u64> {
        let rows = self.backend.scan_prefix(TABLE, PRIMARY_PREFIX)?;
        let mut removed = 0u64;
        for (key, value) in rows {
            let dead_letter: DeadLetter = serde_json::from_slice(&value)?;
            if let Some(reason) = filter.reason {
                if dead_letter.reason != reason {
                    continue;
                }
            }
            if let Some(before_ts) = filter.before_ts {
                if dead_letter.dead_at >= before_ts {
                    continue;
                }
            }
            self.backend.delete(TABLE, &key)?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_backend::InMemoryBackend;
    use relay_types::{DeadLetterReason, Envelope, EnvelopeKind};

    fn dl(dead_at: i64, reason: DeadLetterReason) -> DeadLetter {
        let env = Envelope::new("Lead", "Ghost", EnvelopeKind::Message, "hi").unwrap();
        DeadLetter::new(env, reason, 0, None, dead_at)
    }

    #[test]
    fn list_filters_by_reason_and_orders_newest_first() {
        let store = DeadLetterStore::new(Arc::new(InMemoryBackend::new()));
        store.record(&dl(0, DeadLetterReason::TargetNotFound)).unwrap();
        store.record(&dl(10, DeadLetterReason::TtlExpired)).unwrap();
        store.record(&dl(20, DeadLetterReason::TargetNotFound)).unwrap();

        let mut filter = DeadLetterFilter::default();
        filter.reason = Some(DeadLetterReason::TargetNotFound);
        let got = store.list(&filter).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].dead_at, 20);
        assert_eq!(got[1].dead_at, 0);
    }

    #[test]
    fn purge_removes_matching_rows_only() {
        let store = DeadLetterStore::new(Arc::new(InMemoryBackend::new()));
        store.record(&dl(0, DeadLetterReason::TargetNotFound)).unwrap();
        store.record(&dl(10, DeadLetterReason::TtlExpired)).unwrap();

        let mut filter = DeadLetterFilter::default();
        filter.reason = Some(DeadLetterReason::TtlExpired);
        let removed = store.purge(&filter).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list(&DeadLetterFilter::default()).unwrap().len(), 1);
    }
}
