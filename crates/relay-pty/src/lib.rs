//! PTY-based agent wrapper (C3): spawns a CLI inside a pseudo-terminal,
//! parses its outbound relay commands, and injects inbound envelopes back
//! into its input stream with stability-polling and verified delivery.

pub mod buffer;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod format;
pub mod metrics;
pub mod parser;
pub mod spawn_controller;
pub mod wrapper;

pub use config::{PtyConfig, WrapperSpec};
pub use error::{PtyError, Result};
pub use events::{SessionEndEvent, SummaryEvent, WrapperEvent};
pub use metrics::{InjectionMetrics, InjectionMetricsSnapshot};
pub use parser::OutboundCommand;
pub use spawn_controller::{NoopSpawnController, SpawnController};
pub use wrapper::Wrapper;
