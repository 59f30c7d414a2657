//! The router's view of an attached wrapper (§4.2 "Inbound injection",
//! §4.3).
//!
//! The router never owns a wrapper — the spawner does (§9 "Cycles") — so it
//! only ever holds a [`std::sync::Weak`] handle behind this trait. A
//! wrapper crate (`relay-pty`) implements it; the router depends only on
//! the trait, not on the wrapper's concrete type, keeping the dependency
//! edge one-directional.

use async_trait::async_trait;
use relay_types::Envelope;

/// How an injection attempt into a wrapper's PTY ultimately went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// Verified on the first write.
    VerifiedFirstTry,
    /// Verified after one or more retries.
    VerifiedRetried,
    /// Exhausted all retries without verifying.
    Failed,
}

/// The wrapper-side contract the router delivers through.
///
/// Implementations must serialize injections per target (§4.2: "Only one
/// injection may be in flight per wrapper; further inbound envelopes queue
/// in FIFO order per target") — the router calls `inject` once per
/// recipient per envelope and relies on the implementation, not on the
/// router, to provide that ordering guarantee.
#[async_trait]
pub trait InjectionTarget: Send + Sync {
    /// The agent name this target is registered under.
    fn agent_name(&self) -> &str;

    /// Builds the injection line, writes it into the child PTY, and
    /// verifies delivery, retrying internally per §4.2. Returns the
    /// outcome for injection-metrics bookkeeping; the caller (the router)
    /// treats anything but `Failed` as a delivered envelope.
    async fn inject(&self, envelope: Envelope) -> InjectionOutcome;
}
