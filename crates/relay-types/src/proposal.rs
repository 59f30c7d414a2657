//! Consensus proposals and votes (§3 `Proposal`, §4.8).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How a proposal's votes are tallied into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusType {
    Majority,
    Supermajority,
    Unanimous,
    Weighted,
    Quorum,
}

/// A single participant's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Approve,
    Reject,
    Abstain,
}

/// A recorded vote on a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub agent: String,
    pub value: VoteValue,
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub ts: i64,
}

/// Terminal or pending state of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

/// The tally and outcome recorded once a proposal resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalResult {
    pub decision: ProposalStatus,
    pub approve_weight: u32,
    pub reject_weight: u32,
    pub abstain_weight: u32,
    pub participation_fraction: f64,
    pub quorum_met: bool,
    pub non_voters: Vec<String>,
    pub resolved_at: i64,
}

/// An application-level vote over a set of agents (§3 `Proposal`, §4.8).
///
/// Once `status != Pending` the proposal is immutable: no further votes are
/// accepted and `result` is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub proposer: String,
    pub consensus_type: ConsensusType,
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub weights: HashMap<String, u32>,
    pub created_at: i64,
    pub expires_at: i64,
    pub status: ProposalStatus,
    pub votes: Vec<Vote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ProposalResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
}

/// Default threshold used for `Supermajority` proposals when unspecified.
pub const DEFAULT_SUPERMAJORITY_THRESHOLD: f64 = 0.67;
/// Default per-agent weight when a proposal's `weights` map omits an entry.
pub const DEFAULT_WEIGHT: u32 = 1;

impl Proposal {
    /// The weight assigned to `agent`, defaulting to `DEFAULT_WEIGHT`.
    pub fn weight_of(&self, agent: &str) -> u32 {
        self.weights.get(agent).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    /// Total weight across all participants.
    pub fn total_weight(&self) -> u32 {
        self.participants.iter().map(|a| self.weight_of(a)).sum()
    }

    /// The vote currently on record for `agent`, if any.
    pub fn vote_of(&self, agent: &str) -> Option<&Vote> {
        self.votes.iter().find(|v| v.agent == agent)
    }

    /// Agents who have not yet cast a vote.
    pub fn non_voters(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|a| self.vote_of(a).is_none())
            .cloned()
            .collect()
    }

    pub fn is_participant(&self, agent: &str) -> bool {
        self.participants.iter().any(|a| a == agent)
    }

    pub fn threshold_or_default(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_SUPERMAJORITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Proposal {
        Proposal {
            id: "p1".into(),
            title: "Ship it".into(),
            description: "desc".into(),
            proposer: "Lead".into(),
            consensus_type: ConsensusType::Majority,
            participants: vec!["Dev".into(), "Reviewer".into(), "QA".into()],
            quorum: None,
            threshold: None,
            weights: HashMap::new(),
            created_at: 0,
            expires_at: 1000,
            status: ProposalStatus::Pending,
            votes: Vec::new(),
            result: None,
            thread: None,
        }
    }

    #[test]
    fn default_weight_is_one() {
        let p = sample();
        assert_eq!(p.weight_of("Dev"), 1);
        assert_eq!(p.total_weight(), 3);
    }

    #[test]
    fn non_voters_excludes_voted_agents() {
        let mut p = sample();
        p.votes.push(Vote {
            agent: "Dev".into(),
            value: VoteValue::Approve,
            weight: 1,
            reason: None,
            ts: 1,
        });
        assert_eq!(p.non_voters(), vec!["Reviewer".to_string(), "QA".to_string()]);
    }

    #[test]
    fn default_supermajority_threshold_applies() {
        let p = sample();
        assert_eq!(p.threshold_or_default(), DEFAULT_SUPERMAJORITY_THRESHOLD);
    }
}
