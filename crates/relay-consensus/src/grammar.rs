//! Parses the two relay-grammar command shapes consensus intercepts out of
//! inbound envelope bodies (§4.8): `PROPOSE:`/`TYPE:`/`PARTICIPANTS:`/
//! `DESCRIPTION:` as a multi-line block, and `VOTE <id> <value> [reason]`
//! as a one-liner.

use relay_types::{ConsensusType, VoteValue};

/// A parsed `PROPOSE:` block, prior to being turned into a [`crate::engine::CreateProposalRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProposal {
    pub title: String,
    pub consensus_type: Option<ConsensusType>,
    pub participants: Vec<String>,
    pub description: Option<String>,
}

/// A parsed `VOTE` one-liner.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVote {
    pub proposal_id: String,
    pub value: VoteValue,
    pub reason: Option<String>,
}

/// Tries to parse `body` as a `PROPOSE:` block. Lines are matched by their
/// `KEY:` prefix in any order; unrecognized lines are ignored so a
/// freeform description can follow the header fields.
pub fn parse_propose(body: &str) -> Option<ParsedProposal> {
    let mut title = None;
    let mut consensus_type = None;
    let mut participants = Vec::new();
    let mut description = None;

    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("PROPOSE:") {
            title = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("TYPE:") {
            consensus_type = parse_consensus_type(rest.trim());
        } else if let Some(rest) = line.strip_prefix("PARTICIPANTS:") {
            participants = rest
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        } else if let Some(rest) = line.strip_prefix("DESCRIPTION:") {
            description = Some(rest.trim().to_string());
        }
    }

    let title = title?;
    Some(ParsedProposal {
        title,
        consensus_type,
        participants,
        description,
    })
}

/// Tries to parse `body` as a `VOTE <proposal-id> <approve|reject|abstain> [reason...]` line.
pub fn parse_vote(body: &str) -> Option<ParsedVote> {
    let body = body.trim();
    let rest = body.strip_prefix("VOTE")?;
    let mut parts = rest.trim_start().splitn(3, char::is_whitespace);
    let proposal_id = parts.next()?.trim();
    if proposal_id.is_empty() {
        return None;
    }
    let value_token = parts.next()?.trim();
    let value = parse_vote_value(value_token)?;
    let reason = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    Some(ParsedVote {
        proposal_id: proposal_id.to_string(),
        value,
        reason,
    })
}

fn parse_consensus_type(token: &str) -> Option<ConsensusType> {
    match token.to_ascii_lowercase().as_str() {
        "majority" => Some(ConsensusType::Majority),
        "supermajority" => Some(ConsensusType::Supermajority),
        "unanimous" => Some(ConsensusType::Unanimous),
        "weighted" => Some(ConsensusType::Weighted),
        "quorum" => Some(ConsensusType::Quorum),
        _ => None,
    }
}

fn parse_vote_value(token: &str) -> Option<VoteValue> {
    match token.to_ascii_lowercase().as_str() {
        "approve" => Some(VoteValue::Approve),
        "reject" => Some(VoteValue::Reject),
        "abstain" => Some(VoteValue::Abstain),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_propose_block() {
        let body = "PROPOSE: Ship release 2.0\nTYPE: unanimous\nPARTICIPANTS: Dev, Reviewer, QA\nDESCRIPTION: cut the tag once CI is green";
        let parsed = parse_propose(body).unwrap();
        assert_eq!(parsed.title, "Ship release 2.0");
        assert_eq!(parsed.consensus_type, Some(ConsensusType::Unanimous));
        assert_eq!(parsed.participants, vec!["Dev", "Reviewer", "QA"]);
        assert_eq!(parsed.description.as_deref(), Some("cut the tag once CI is green"));
    }

    #[test]
    fn propose_without_title_is_not_a_proposal() {
        assert!(parse_propose("TYPE: majority\nPARTICIPANTS: Dev").is_none());
    }

    #[test]
    fn propose_defaults_are_absent_when_omitted() {
        let parsed = parse_propose("PROPOSE: quick check").unwrap();
        assert_eq!(parsed.consensus_type, None);
        assert!(parsed.participants.is_empty());
        assert_eq!(parsed.description, None);
    }

    #[test]
    fn parses_vote_with_reason() {
        let parsed = parse_vote("VOTE p1 approve looks good to me").unwrap();
        assert_eq!(parsed.proposal_id, "p1");
        assert_eq!(parsed.value, VoteValue::Approve);
        assert_eq!(parsed.reason.as_deref(), Some("looks good to me"));
    }

    #[test]
    fn parses_vote_without_reason() {
        let parsed = parse_vote("VOTE p1 reject").unwrap();
        assert_eq!(parsed.reason, None);
    }

    #[test]
    fn rejects_unrecognized_vote_value() {
        assert!(parse_vote("VOTE p1 maybe").is_none());
    }

    #[test]
    fn plain_message_body_is_not_a_vote() {
        assert!(parse_vote("I voted already, thanks").is_none());
    }
}
