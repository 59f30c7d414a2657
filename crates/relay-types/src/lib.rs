//! Shared data model for the agent relay daemon.
//!
//! Every component in the daemon (router, store, spawner, sync, consensus)
//! speaks in terms of the types defined here: the [`Envelope`] that crosses
//! every boundary, the [`StoredMessage`] the store persists it as, the
//! [`Session`] and [`AgentSummary`] that track a running agent, the
//! [`DeadLetter`] recorded when delivery ultimately fails, and the
//! [`Proposal`]/[`Vote`] pair used for lightweight multi-agent consensus.

mod deadletter;
mod envelope;
mod error;
mod message;
mod proposal;
mod session;

pub use deadletter::{DeadLetter, DeadLetterFilter, DeadLetterReason};
pub use envelope::{Envelope, EnvelopeKind, PayloadMeta, BROADCAST_TARGET};
pub use error::{Result, TypesError};
pub use message::{MessageFilter, MessageStatus, StoredMessage};
pub use proposal::{
    ConsensusType, Proposal, ProposalResult, ProposalStatus, Vote, VoteValue,
    DEFAULT_SUPERMAJORITY_THRESHOLD, DEFAULT_WEIGHT,
};
pub use session::{AgentSummary, ClosedBy, Session, SessionFilter};
