//! Application-level proposal/vote tallying layered over the router (C7,
//! §4.8). Agents open a proposal by sending a `PROPOSE:` body and vote by
//! sending a `VOTE <id> <value>` one-liner; [`ConsensusEngine`] intercepts
//! both off the router's inbound stream before they would otherwise reach
//! an addressee as a plain message, tallies votes against the proposal's
//! consensus type, and auto-resolves as soon as the outcome is
//! mathematically settled rather than waiting for every participant.
//!
//! This is vote tallying over point-to-point messaging, not a replicated
//! BFT protocol: there is no leader election, no block production, and no
//! cryptographic agreement across machines.

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod resolution;

pub use config::ConsensusConfig;
pub use engine::{ConsensusEngine, ConsensusEvent, CreateProposalRequest};
pub use error::{ConsensusError, Result};
