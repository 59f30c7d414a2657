//! Pure auto-resolution rules (§4.8 "Auto-resolution rule per type").
//!
//! Kept free of the engine's locking and timers so the tallying logic
//! itself is trivial to unit test: given a proposal's current vote state,
//! decide whether the outcome is already mathematically inevitable.

use relay_types::{ConsensusType, Proposal, ProposalStatus, VoteValue};

/// The inevitable terminal status for `proposal`'s current vote tally, if
/// one can already be determined; `None` means the tally is still open.
pub fn evaluate(proposal: &Proposal) -> Option<ProposalStatus> {
    let total_weight: u64 = proposal.total_weight() as u64;
    if total_weight == 0 {
        return None;
    }

    let approve_weight: u64 = sum_weight(proposal, VoteValue::Approve);
    let reject_weight: u64 = sum_weight(proposal, VoteValue::Reject);

    match proposal.consensus_type {
        ConsensusType::Unanimous => {
            if proposal.votes.iter().any(|v| v.value == VoteValue::Reject) {
                return Some(ProposalStatus::Rejected);
            }
            if proposal.non_voters().is_empty() {
                // No rejection was found above, so every cast vote is
                // either approve or abstain; unanimity requires all-approve.
                let all_approve = proposal
                    .votes
                    .iter()
                    .all(|v| v.value == VoteValue::Approve);
                return Some(if all_approve {
                    ProposalStatus::Approved
                } else {
                    ProposalStatus::Rejected
                });
            }
            None
        }
        ConsensusType::Majority | ConsensusType::Weighted => {
            majority_verdict(approve_weight, reject_weight, total_weight)
        }
        ConsensusType::Quorum => {
            let quorum = proposal.quorum.unwrap_or(0) as usize;
            if proposal.votes.len() < quorum {
                return None;
            }
            majority_verdict(approve_weight, reject_weight, total_weight)
        }
        ConsensusType::Supermajority => {
            let threshold = proposal.threshold_or_default();
            let approve_needed = (threshold * total_weight as f64).ceil() as u64;
            if approve_weight >= approve_needed {
                return Some(ProposalStatus::Approved);
            }
            let reject_needed = ((1.0 - threshold) * total_weight as f64).floor() as u64 + 1;
            if reject_weight >= reject_needed {
                return Some(ProposalStatus::Rejected);
            }
            None
        }
    }
}

fn majority_verdict(approve_weight: u64, reject_weight: u64, total_weight: u64) -> Option<ProposalStatus> {
    let half = total_weight as f64 / 2.0;
    if approve_weight as f64 > half {
        Some(ProposalStatus::Approved)
    } else if reject_weight as f64 > half {
        Some(ProposalStatus::Rejected)
    } else {
        None
    }
}

fn sum_weight(proposal: &Proposal, value: VoteValue) -> u64 {
    proposal
        .votes
        .iter()
        .filter(|v| v.value == value)
        .map(|v| v.weight as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::Vote;
    use std::collections::HashMap;

    fn base(consensus_type: ConsensusType, participants: &[&str]) -> Proposal {
        Proposal {
            id: "p1".into(),
            title: "t".into(),
            description: "d".into(),
            proposer: "Lead".into(),
            consensus_type,
            participants: participants.iter().map(|s| s.to_string()).collect(),
            quorum: None,
            threshold: None,
            weights: HashMap::new(),
            created_at: 0,
            expires_at: 1_000_000,
            status: ProposalStatus::Pending,
            votes: Vec::new(),
            result: None,
            thread: None,
        }
    }

    fn cast(proposal: &mut Proposal, agent: &str, value: VoteValue) {
        proposal.votes.push(Vote {
            agent: agent.into(),
            value,
            weight: proposal.weight_of(agent),
            reason: None,
            ts: 0,
        });
    }

    #[test]
    fn majority_resolves_before_all_vote() {
        let mut p = base(ConsensusType::Majority, &["Dev", "Reviewer", "QA"]);
        cast(&mut p, "Dev", VoteValue::Approve);
        cast(&mut p, "Reviewer", VoteValue::Approve);
        assert_eq!(evaluate(&p), Some(ProposalStatus::Approved));
    }

    #[test]
    fn unanimous_rejects_on_first_rejection() {
        let mut p = base(ConsensusType::Unanimous, &["Dev", "Reviewer", "QA"]);
        cast(&mut p, "Reviewer", VoteValue::Reject);
        assert_eq!(evaluate(&p), Some(ProposalStatus::Rejected));
    }

    #[test]
    fn unanimous_pending_until_all_voted() {
        let mut p = base(ConsensusType::Unanimous, &["Dev", "Reviewer"]);
        cast(&mut p, "Dev", VoteValue::Approve);
        assert_eq!(evaluate(&p), None);
        cast(&mut p, "Reviewer", VoteValue::Approve);
        assert_eq!(evaluate(&p), Some(ProposalStatus::Approved));
    }

    #[test]
    fn quorum_waits_for_minimum_vote_count() {
        let mut p = base(ConsensusType::Quorum, &["Dev", "Reviewer", "QA", "Ops"]);
        p.quorum = Some(3);
        cast(&mut p, "Dev", VoteValue::Approve);
        cast(&mut p, "Reviewer", VoteValue::Approve);
        assert_eq!(evaluate(&p), None);
        cast(&mut p, "QA", VoteValue::Approve);
        assert_eq!(evaluate(&p), Some(ProposalStatus::Approved));
    }

    #[test]
    fn supermajority_approves_once_threshold_is_irreversible() {
        // 10 participants, 0.67 threshold -> 7 approvals needed (ceil(6.7)).
        // Resolve once 7 of 10 have approved, with 3 still unvoted: even if
        // all three later reject, the final ratio stays 7/10 >= 0.67, so the
        // outcome is already irreversible.
        let names: Vec<String> = (1..=10).map(|n| format!("P{n}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut p = base(ConsensusType::Supermajority, &refs);
        p.threshold = Some(0.67);
        for name in &names[..7] {
            cast(&mut p, name, VoteValue::Approve);
        }
        assert_eq!(evaluate(&p), Some(ProposalStatus::Approved));
    }

    #[test]
    fn supermajority_rejects_once_threshold_is_unreachable() {
        let mut p = base(ConsensusType::Supermajority, &["A", "B", "C"]);
        p.threshold = Some(0.67);
        cast(&mut p, "A", VoteValue::Reject);
        cast(&mut p, "B", VoteValue::Reject);
        assert_eq!(evaluate(&p), Some(ProposalStatus::Rejected));
    }

    #[test]
    fn weighted_respects_custom_weights() {
        let mut p = base(ConsensusType::Weighted, &["Lead", "Dev"]);
        p.weights.insert("Lead".into(), 3);
        p.weights.insert("Dev".into(), 1);
        cast(&mut p, "Lead", VoteValue::Approve);
        assert_eq!(evaluate(&p), Some(ProposalStatus::Approved));
    }
}
