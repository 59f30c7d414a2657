//! The router itself (C4, §4.3): one live connection per agent name,
//! envelope delivery with retry/DLQ handoff, broadcast fan-out,
//! `delivery_seq` assignment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use relay_types::{DeadLetterReason, Envelope};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{Result, RouterError};
use crate::injection::{InjectionOutcome, InjectionTarget};
use crate::registry::Registry;
use crate::sink::{
    AlwaysValid, DeadLetterSink, EnvelopeSink, InboundInterceptor, InterceptOutcome,
    NoopDeadLetterSink, NoopEnvelopeSink, NoopSessionSink, PassThroughInterceptor, SessionSink,
    SignatureVerifier,
};

/// Capacity of the router's internal event-broadcast channel (dashboard
/// live stream, §4.7 relay-web consumer).
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A routed envelope, published on the router's event stream for
/// dashboards and other observers (`relay-web`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct RouterEvent {
    pub envelope: Envelope,
    pub outcome: LegOutcome,
    pub recipient: String,
}

/// The per-leg result of attempting to deliver one envelope to one
/// recipient. A broadcast produces one of these per currently-attached
/// agent.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegOutcome {
    Delivered { delivery_seq: u64 },
    DeadLettered { reason: DeadLetterReason },
    Consumed,
}

/// Pluggable collaborators the router is constructed with (§9
/// "Callback-injected policy/spawner hooks"). Every field defaults to a
/// no-op so tests can build a bare router with `RouterConfig::default()`.
pub struct RouterConfig {
    pub envelope_sink: Arc<dyn EnvelopeSink>,
    pub dead_letter_sink: Arc<dyn DeadLetterSink>,
    pub signature_verifier: Arc<dyn SignatureVerifier>,
    pub interceptor: Arc<dyn InboundInterceptor>,
    pub session_sink: Arc<dyn SessionSink>,
    /// Whether envelopes must carry a valid signature to be routed at all
    /// (§4.3 "when cryptographic signing is enabled").
    pub require_signatures: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            envelope_sink: Arc::new(NoopEnvelopeSink),
            dead_letter_sink: Arc::new(NoopDeadLetterSink),
            signature_verifier: Arc::new(AlwaysValid),
            interceptor: Arc::new(PassThroughInterceptor),
            session_sink: Arc::new(NoopSessionSink),
            require_signatures: false,
        }
    }
}

/// The envelope router. Cheap to clone (all state is behind `Arc`-backed
/// fields), so it is typically held as `Arc<Router>` and handed to
/// wrappers, the spawner, and the consensus engine alike.
pub struct Router {
    registry: Registry,
    delivery_seq: Mutex<HashMap<String, u64>>,
    last_ts: AtomicI64,
    config: RouterConfig,
    events: broadcast::Sender<RouterEvent>,
    total_routed: AtomicU64,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: Registry::new(),
            delivery_seq: Mutex::new(HashMap::new()),
            last_ts: AtomicI64::new(0),
            config,
            events,
            total_routed: AtomicU64::new(0),
        }
    }

    /// Registers `handle`, displacing and notifying any prior connection
    /// under the same name (§4.3 invariant).
    pub fn register(&self, handle: Arc<dyn InjectionTarget>) {
        let name = handle.agent_name().to_string();
        if self.registry.register(handle).is_some() {
            debug!(agent = %name, "displacing prior connection");
            self.config.session_sink.on_displaced(&name);
        }
    }

    /// Removes `name` from the routing table unconditionally.
    pub fn unregister(&self, name: &str) {
        self.registry.unregister(name);
    }

    pub fn get_connection(&self, name: &str) -> Option<Arc<dyn InjectionTarget>> {
        self.registry.get(name)
    }

    pub fn get_agents(&self) -> Vec<String> {
        self.registry.agent_names()
    }

    /// Subscribes to the router's live event stream (dashboard consumer).
    pub fn subscribe_events(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    /// Assigns the router's monotonic millisecond `ts` to `envelope`,
    /// never decreasing even if the wall clock does (§3 invariant: "`ts`
    /// is non-decreasing per sender on a single connection" — enforced
    /// globally here, which is strictly stronger and therefore safe).
    fn stamp(&self, envelope: Envelope) -> Envelope {
        let wall = chrono_ms();
        let mut prev = self.last_ts.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last_ts
                .compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return envelope.with_ts(next),
                Err(actual) => prev = actual,
            }
        }
    }

    fn next_delivery_seq(&self, recipient: &str) -> u64 {
        let mut seqs = self.delivery_seq.lock();
        let seq = seqs.entry(recipient.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Accepts and routes one envelope end to end (§4.3 "Delivery
    /// policy"). Returns the outcome for every recipient the envelope was
    /// (or would have been) delivered to: one leg for unicast, one per
    /// currently-attached agent for broadcast.
    pub async fn route(&self, envelope: Envelope) -> Result<Vec<LegOutcome>> {
        if self.config.require_signatures && !self.config.signature_verifier.verify(&envelope) {
            return Err(RouterError::SignatureInvalid(envelope.id));
        }

        let envelope = self.stamp(envelope);
        self.config.envelope_sink.on_accepted(&envelope);
        self.total_routed.fetch_add(1, Ordering::Relaxed);

        if let InterceptOutcome::Consumed = self.config.interceptor.intercept(&envelope) {
            self.publish(&envelope, "*", LegOutcome::Consumed);
            return Ok(vec![LegOutcome::Consumed]);
        }

        if envelope.is_broadcast {
            let targets = self.registry.broadcast_targets(&envelope.from);
            let legs = join_all(
                targets
                    .into_iter()
                    .map(|target| self.deliver_one(envelope.clone(), target)),
            )
            .await;
            Ok(legs)
        } else {
            let recipient = envelope.to.clone();
            Ok(vec![self.deliver_one(envelope, recipient).await])
        }
    }

    /// Delivers `envelope` to exactly one `recipient`, dead-lettering on
    /// failure and publishing the leg on the event stream either way.
    async fn deliver_one(&self, envelope: Envelope, recipient: String) -> LegOutcome {
        if envelope.payload_meta.as_ref().and_then(|m| m.ttl_ms).is_some()
            && envelope.is_expired(chrono_ms())
        {
            self.dead_letter(&envelope, DeadLetterReason::TtlExpired, 0, "ttl expired before delivery");
            let outcome = LegOutcome::DeadLettered {
                reason: DeadLetterReason::TtlExpired,
            };
            self.publish(&envelope, &recipient, outcome.clone());
            return outcome;
        }

        let Some(target) = self.registry.get(&recipient) else {
            self.dead_letter(&envelope, DeadLetterReason::TargetNotFound, 0, "no attached agent");
            self.maybe_ack_failure(&envelope);
            let outcome = LegOutcome::DeadLettered {
                reason: DeadLetterReason::TargetNotFound,
            };
            self.publish(&envelope, &recipient, outcome.clone());
            return outcome;
        };

        let outcome = target.inject(envelope.clone()).await;
        match outcome {
            InjectionOutcome::VerifiedFirstTry | InjectionOutcome::VerifiedRetried => {
                let seq = self.next_delivery_seq(&recipient);
                self.config.envelope_sink.on_delivered(&envelope, &recipient, seq);
                let leg = LegOutcome::Delivered { delivery_seq: seq };
                self.publish(&envelope, &recipient, leg.clone());
                leg
            }
            InjectionOutcome::Failed => {
                let reason = if self.registry.get(&recipient).is_some() {
                    DeadLetterReason::MaxRetriesExceeded
                } else {
                    DeadLetterReason::ConnectionLost
                };
                self.dead_letter(&envelope, reason, 3, "injection not verified after retries");
                self.maybe_ack_failure(&envelope);
                let leg = LegOutcome::DeadLettered { reason };
                self.publish(&envelope, &recipient, leg.clone());
                leg
            }
        }
    }

    fn dead_letter(&self, envelope: &Envelope, reason: DeadLetterReason, attempts: u32, msg: &str) {
        warn!(to = %envelope.to, %reason, "dead-lettering envelope");
        self.config
            .dead_letter_sink
            .on_dead_letter(envelope, reason, attempts, msg);
    }

    /// §7: "Target absent ... sender not informed unless `requires_ack`
    /// was set (then a system envelope back to the sender)."
    fn maybe_ack_failure(&self, envelope: &Envelope) {
        let requires_ack = envelope
            .payload_meta
            .as_ref()
            .and_then(|m| m.requires_ack)
            .unwrap_or(false);
        if !requires_ack {
            return;
        }
        if let Ok(notice) = relay_types::Envelope::new(
            "system",
            envelope.from.clone(),
            relay_types::EnvelopeKind::System,
            format!("delivery to {} failed", envelope.to),
        ) {
            self.config.envelope_sink.on_accepted(&notice);
        }
    }

    fn publish(&self, envelope: &Envelope, recipient: &str, outcome: LegOutcome) {
        let _ = self.events.send(RouterEvent {
            envelope: envelope.clone(),
            outcome,
            recipient: recipient.to_string(),
        });
    }

    pub fn total_routed(&self) -> u64 {
        self.total_routed.load(Ordering::Relaxed)
    }
}

fn chrono_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use relay_types::EnvelopeKind;
    use std::sync::Arc;

    struct EchoTarget {
        name: String,
        received: Arc<SyncMutex<Vec<Envelope>>>,
        outcome: InjectionOutcome,
    }

    #[async_trait::async_trait]
    impl InjectionTarget for EchoTarget {
        fn agent_name(&self) -> &str {
            &self.name
        }
        async fn inject(&self, envelope: Envelope) -> InjectionOutcome {
            self.received.lock().push(envelope);
            self.outcome
        }
    }

    #[tokio::test]
    async fn s1_unicast_round_trip_delivers_and_assigns_seq() {
        let router = Router::new(RouterConfig::default());
        let received = Arc::new(SyncMutex::new(Vec::new()));
        router.register(Arc::new(EchoTarget {
            name: "Dev".into(),
            received: received.clone(),
            outcome: InjectionOutcome::VerifiedFirstTry,
        }));

        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "Please ack").unwrap();
        let legs = router.route(env).await.unwrap();
        assert_eq!(legs.len(), 1);
        match legs[0] {
            LegOutcome::Delivered { delivery_seq } => assert_eq!(delivery_seq, 1),
            ref other => panic!("expected delivered, got {other:?}"),
        }
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn s3_target_not_found_dead_letters_without_injection() {
        struct Recorder(SyncMutex<Vec<DeadLetterReason>>);
        impl DeadLetterSink for Recorder {
            fn on_dead_letter(
                &self,
                _envelope: &Envelope,
                reason: DeadLetterReason,
                _attempts: u32,
                _msg: &str,
            ) {
                self.0.lock().push(reason);
            }
        }
        let recorder = Arc::new(Recorder(SyncMutex::new(Vec::new())));
        let router = Router::new(RouterConfig {
            dead_letter_sink: recorder.clone(),
            ..RouterConfig::default()
        });

        let env = Envelope::new("Lead", "Ghost", EnvelopeKind::Message, "hi").unwrap();
        let legs = router.route(env).await.unwrap();
        assert!(matches!(
            legs[0],
            LegOutcome::DeadLettered {
                reason: DeadLetterReason::TargetNotFound
            }
        ));
        assert_eq!(recorder.0.lock().as_slice(), [DeadLetterReason::TargetNotFound]);
    }

    #[tokio::test]
    async fn s7_broadcast_fans_out_to_every_attached_agent_except_sender() {
        let router = Router::new(RouterConfig::default());
        let received_b = Arc::new(SyncMutex::new(Vec::new()));
        let received_c = Arc::new(SyncMutex::new(Vec::new()));
        router.register(Arc::new(EchoTarget {
            name: "A".into(),
            received: Arc::new(SyncMutex::new(Vec::new())),
            outcome: InjectionOutcome::VerifiedFirstTry,
        }));
        router.register(Arc::new(EchoTarget {
            name: "B".into(),
            received: received_b.clone(),
            outcome: InjectionOutcome::VerifiedFirstTry,
        }));
        router.register(Arc::new(EchoTarget {
            name: "C".into(),
            received: received_c.clone(),
            outcome: InjectionOutcome::Failed,
        }));

        let env = Envelope::new("A", "*", EnvelopeKind::Message, "status report").unwrap();
        let legs = router.route(env).await.unwrap();
        assert_eq!(legs.len(), 2); // excludes sender "A"
        assert_eq!(received_b.lock().len(), 1);
        let delivered = legs
            .iter()
            .filter(|l| matches!(l, LegOutcome::Delivered { .. }))
            .count();
        let dead_lettered = legs
            .iter()
            .filter(|l| matches!(l, LegOutcome::DeadLettered { .. }))
            .count();
        assert_eq!(delivered, 1);
        assert_eq!(dead_lettered, 1);
    }

    #[tokio::test]
    async fn displacing_a_registration_notifies_the_session_sink() {
        struct Recorder(SyncMutex<Vec<String>>);
        impl SessionSink for Recorder {
            fn on_displaced(&self, agent_name: &str) {
                self.0.lock().push(agent_name.to_string());
            }
        }
        let recorder = Arc::new(Recorder(SyncMutex::new(Vec::new())));
        let router = Router::new(RouterConfig {
            session_sink: recorder.clone(),
            ..RouterConfig::default()
        });

        router.register(Arc::new(EchoTarget {
            name: "Dev".into(),
            received: Arc::new(SyncMutex::new(Vec::new())),
            outcome: InjectionOutcome::VerifiedFirstTry,
        }));
        router.register(Arc::new(EchoTarget {
            name: "Dev".into(),
            received: Arc::new(SyncMutex::new(Vec::new())),
            outcome: InjectionOutcome::VerifiedFirstTry,
        }));

        assert_eq!(recorder.0.lock().as_slice(), ["Dev".to_string()]);
    }

    #[tokio::test]
    async fn consumed_envelopes_never_reach_injection() {
        struct ConsumeVotes;
        impl InboundInterceptor for ConsumeVotes {
            fn intercept(&self, envelope: &Envelope) -> InterceptOutcome {
                if envelope.kind == EnvelopeKind::Vote {
                    InterceptOutcome::Consumed
                } else {
                    InterceptOutcome::PassThrough
                }
            }
        }
        let router = Router::new(RouterConfig {
            interceptor: Arc::new(ConsumeVotes),
            ..RouterConfig::default()
        });
        let received = Arc::new(SyncMutex::new(Vec::new()));
        router.register(Arc::new(EchoTarget {
            name: "Dev".into(),
            received: received.clone(),
            outcome: InjectionOutcome::VerifiedFirstTry,
        }));

        let env = Envelope::new("Lead", "Dev", EnvelopeKind::Vote, "VOTE p1 approve").unwrap();
        let legs = router.route(env).await.unwrap();
        assert!(matches!(legs[0], LegOutcome::Consumed));
        assert!(received.lock().is_empty());
    }
}
