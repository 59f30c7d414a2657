//! Side-effect hooks the daemon wires into the router at construction
//! (§9 "Callback-injected policy/spawner hooks": replace ad hoc callbacks
//! with interfaces required at construction time).
//!
//! The router itself knows nothing about RocksDB, HTTP sync queues, or
//! cryptographic signing — those concerns live in `relay-storage`,
//! `relay-sync`, and the daemon's own signing module. Each is wired in as
//! a trait object so `relay-router` stays a leaf-ish crate with no
//! dependency on storage or networking.

use relay_types::{DeadLetterReason, Envelope};

/// Called for every envelope that is accepted by the router, before and
/// regardless of delivery outcome (§2: "Every envelope that crosses C4 is
/// additionally appended to C1 and, when cloud mode is on, enqueued into
/// C6."). A no-op implementation is a valid default for tests.
pub trait EnvelopeSink: Send + Sync {
    fn on_accepted(&self, envelope: &Envelope);

    /// Called once a unicast leg's outcome is known, carrying the
    /// per-recipient `delivery_seq` the router assigned for this leg
    /// (§3 `StoredMessage`, §4.3 "the router assigns monotonically
    /// increasing `delivery_seq` per recipient"). The default
    /// implementation ignores it; a store-backed sink uses it to build
    /// the `StoredMessage` row.
    fn on_delivered(&self, _envelope: &Envelope, _recipient: &str, _delivery_seq: u64) {}
}

/// Called when a delivery attempt ultimately fails, so the implementation
/// can persist a `DeadLetter` row (§4.6).
pub trait DeadLetterSink: Send + Sync {
    fn on_dead_letter(
        &self,
        envelope: &Envelope,
        reason: DeadLetterReason,
        attempt_count: u32,
        error_message: &str,
    );
}

/// Verifies envelope signatures when cryptographic signing is enabled
/// (§4.3, §7). The core does not implement signing itself; a no-op
/// verifier (`AlwaysValid`) is the correct default per the spec's scope.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, envelope: &Envelope) -> bool;
}

/// Default verifier that accepts every envelope: signing is an external
/// collaborator's concern (§1 Scope).
pub struct AlwaysValid;

impl SignatureVerifier for AlwaysValid {
    fn verify(&self, _envelope: &Envelope) -> bool {
        true
    }
}

/// What an inbound interceptor (the consensus engine, §4.8) decided to do
/// with an envelope before it would otherwise have been injected.
pub enum InterceptOutcome {
    /// Let the envelope continue to normal delivery.
    PassThrough,
    /// The interceptor consumed the envelope (e.g. it was a `PROPOSE:`/
    /// `VOTE` body); it must not reach the addressee as a plain message.
    Consumed,
}

/// Hook allowing a higher-level component to consume specific inbound
/// envelopes before they are routed to their target (§4.8: "Both are
/// parsed out of inbound envelopes before normal delivery — they do not
/// reach the addressee as a message."). The default no-op passes
/// everything through.
pub trait InboundInterceptor: Send + Sync {
    fn intercept(&self, envelope: &Envelope) -> InterceptOutcome;
}

/// Default interceptor that never consumes anything.
pub struct PassThroughInterceptor;

impl InboundInterceptor for PassThroughInterceptor {
    fn intercept(&self, _envelope: &Envelope) -> InterceptOutcome {
        InterceptOutcome::PassThrough
    }
}

/// Notified when a registration displaces a still-live connection under
/// the same name (§4.3 invariant: "a newer registration displaces the
/// older, which is closed with `closed_by = 'disconnect'`"). The default
/// is a no-op; the daemon wires this to the session store's `endSession`.
pub trait SessionSink: Send + Sync {
    fn on_displaced(&self, agent_name: &str);
}

/// Default sink that does nothing.
pub struct NoopSessionSink;

impl SessionSink for NoopSessionSink {
    fn on_displaced(&self, _agent_name: &str) {}
}

/// No-op [`EnvelopeSink`] for tests and defaults.
pub struct NoopEnvelopeSink;

impl EnvelopeSink for NoopEnvelopeSink {
    fn on_accepted(&self, _envelope: &Envelope) {}
}

/// No-op [`DeadLetterSink`] for tests and defaults.
pub struct NoopDeadLetterSink;

impl DeadLetterSink for NoopDeadLetterSink {
    fn on_dead_letter(
        &self,
        _envelope: &Envelope,
        _reason: DeadLetterReason,
        _attempt_count: u32,
        _error_message: &str,
    ) {
    }
}
