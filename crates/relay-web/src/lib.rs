//! Thin HTTP/WebSocket dashboard over the router, store, spawner, and
//! consensus engine (§1 "Secondary concerns left to external
//! collaborators": the dashboard is a thin view, not core logic).
//!
//! This crate owns no state of its own: every handler reads or calls
//! through to [`relay_router::Router`], [`relay_storage::MessageStore`]/
//! [`relay_storage::DeadLetterStore`], [`relay_spawner::Spawner`], and
//! [`relay_consensus::ConsensusEngine`], all wired in by `relay-daemon` at
//! construction. It is also the HTTP surface the spawner posts a newly
//! spawned agent's initial task through (`POST /api/envelopes`), so that
//! task delivery goes through the same relay path as any other message
//! (§4.4 "preferring an HTTP-send to the local dashboard").

pub mod error;
pub mod routes;
pub mod state;
pub mod templates;
pub mod ws;

pub use error::WebError;
pub use routes::dashboard_routes;
pub use state::DashboardState;
