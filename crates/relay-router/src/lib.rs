//! # Relay Router
//!
//! The in-process registry and delivery engine for the agent relay daemon
//! (C4, §4.3). It holds the mapping from agent name to the currently
//! attached wrapper, delivers envelopes (unicast and broadcast), and hands
//! failed deliveries off to a dead-letter sink.
//!
//! The router is deliberately thin on dependencies: it knows nothing about
//! RocksDB, HTTP, or PTYs. Collaborators are wired in at construction via
//! the trait objects in [`sink`] and [`injection`], which keeps the
//! dependency graph acyclic even though, conceptually, the router and the
//! wrappers it talks to reference each other (§9 "Cycles").
//!
//! ## Example
//!
//! ```rust
//! use relay_router::{Router, RouterConfig};
//! use relay_types::{Envelope, EnvelopeKind};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let router = Router::new(RouterConfig::default());
//! // A wrapper registers itself with `router.register(handle)`, then
//! // sends accepted outbound commands through `router.route(envelope)`.
//! let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "status?").unwrap();
//! let _ = router.route(env).await;
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod injection;
pub mod registry;
pub mod sink;

pub use error::{Result, RouterError};
pub use hub::{LegOutcome, Router, RouterConfig, RouterEvent};
pub use injection::{InjectionOutcome, InjectionTarget};
pub use registry::Registry;
pub use sink::{
    AlwaysValid, DeadLetterSink, EnvelopeSink, InboundInterceptor, InterceptOutcome,
    NoopDeadLetterSink, NoopEnvelopeSink, NoopSessionSink, PassThroughInterceptor, SessionSink,
    SignatureVerifier,
};
