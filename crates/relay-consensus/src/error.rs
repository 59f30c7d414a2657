//! Consensus engine error types (§7: "Proposal: non-participant votes,
//! cancel by non-proposer, double-vote when forbidden ... returned to
//! caller as a typed error; proposal unchanged").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("no proposal with id {0}")]
    NotFound(String),

    #[error("proposal {0} is no longer pending")]
    NotPending(String),

    #[error("proposal {0} has expired")]
    Expired(String),

    #[error("{agent} is not a participant in proposal {proposal_id}")]
    NotParticipant { proposal_id: String, agent: String },

    #[error("{agent} already voted on proposal {proposal_id} and vote changes are disabled")]
    DuplicateVote { proposal_id: String, agent: String },

    #[error("only the proposer ({proposer}) may cancel proposal {proposal_id}")]
    NotProposer { proposal_id: String, proposer: String },

    #[error("proposal requires at least one participant")]
    EmptyParticipants,
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
