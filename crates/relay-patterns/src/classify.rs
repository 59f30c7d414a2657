//! Body/target classifiers that decide whether a parsed outbound command is
//! a real relay send or noise (documentation, examples, placeholder targets).

use once_cell::sync::Lazy;
use regex::Regex;

/// A valid agent name: PascalCase, 2-30 characters, starting with an
/// uppercase letter.
static AGENT_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]{1,29}$").unwrap());

/// Target names that look like a generic placeholder rather than a real
/// agent, typically copy-pasted straight out of documentation.
const PLACEHOLDER_TARGETS: &[&str] = &[
    "agentname",
    "targetagent",
    "target",
    "name",
    "recipient",
    "youragent",
    "yourtargetagent",
    "agent",
    "someagent",
    "otheragent",
];

/// Phrases that mark a line as documentation/example prose rather than a
/// live command, regardless of whether it happens to contain the relay
/// prefix.
const INSTRUCTIONAL_MARKERS: &[&str] = &[
    "for example",
    "e.g.",
    "such as",
    "for instance",
    "example:",
    "e.g:",
];

/// Whether `body` reads as instructional/example text rather than a real
/// message (§4.1, §4.2 edge case 4, §8 property 4).
pub fn is_instructional_text(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    INSTRUCTIONAL_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
        || (lower.starts_with('<') && lower.ends_with('>'))
}

/// Whether `target` is a generic placeholder rather than a real agent name.
pub fn is_placeholder_target(target: &str) -> bool {
    let stripped = target.trim_matches(|c| c == '<' || c == '>');
    let lower = stripped.to_ascii_lowercase();
    PLACEHOLDER_TARGETS.contains(&lower.as_str())
}

/// Whether `name` is a syntactically valid agent name: PascalCase, 2-30
/// characters.
pub fn is_valid_agent_name(name: &str) -> bool {
    AGENT_NAME_RE.is_match(name)
}

/// Whether a candidate `(target, body)` send should be rejected outright,
/// before it ever reaches the dedup set.
pub fn should_reject(target: &str, body: &str) -> bool {
    is_placeholder_target(target) || !is_valid_agent_name(target) || is_instructional_text(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        assert!(is_valid_agent_name("Dev"));
        assert!(is_valid_agent_name("ReviewerTwo"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(!is_valid_agent_name("d")); // too short
        assert!(!is_valid_agent_name("dev")); // not PascalCase
        assert!(!is_valid_agent_name(&"A".repeat(31))); // too long
    }

    #[test]
    fn placeholder_targets_are_caught_case_insensitively() {
        assert!(is_placeholder_target("AgentName"));
        assert!(is_placeholder_target("TARGET"));
        assert!(is_placeholder_target("<Target>"));
        assert!(!is_placeholder_target("Dev"));
    }

    #[test]
    fn instructional_markers_are_detected() {
        assert!(is_instructional_text("For example, send a status update"));
        assert!(is_instructional_text("<your message here>"));
        assert!(!is_instructional_text("Please ack"));
    }

    #[test]
    fn should_reject_combines_all_checks() {
        assert!(should_reject("AgentName", "hello"));
        assert!(should_reject("Dev", "e.g. do this"));
        assert!(!should_reject("Dev", "Please ack"));
    }
}
