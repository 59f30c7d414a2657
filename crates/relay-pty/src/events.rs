//! Structured markers the wrapper scans for in a child's output, and the
//! typed events it emits (§4.2 "Events", §9 "EventEmitter fan-out").
//!
//! The source's `EventEmitter` fan-out is replaced with an explicit
//! subscription registry: each subscriber gets a typed `mpsc` sink, and
//! subscriptions are detached before the wrapper exits (see
//! [`crate::wrapper::Wrapper::stop`]).

use serde::{Deserialize, Serialize};

/// A self-reported agent state update, emitted as a fenced JSON block in
/// the child's output (§3 `AgentSummary`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryEvent {
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Emitted when the child prints a `[[SESSION_END]] ... [[/SESSION_END]]`
/// block (§4.2 "Events").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEndEvent {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub closed_by: Option<String>,
}

/// Everything a subscriber can observe about a running wrapper.
#[derive(Debug, Clone)]
pub enum WrapperEvent {
    /// A raw output chunk, as captured (not ANSI-stripped).
    Output(String),
    /// A parsed `summary` marker.
    Summary(SummaryEvent),
    /// A parsed `[[SESSION_END]]` marker.
    SessionEnd(SessionEndEvent),
    /// The child process exited, carrying its exit code (`None` if it was
    /// killed by a signal).
    Exit(Option<i32>),
}

const SUMMARY_OPEN: &str = "[[AGENT_SUMMARY]]";
const SUMMARY_CLOSE: &str = "[[/AGENT_SUMMARY]]";
const SESSION_END_OPEN: &str = "[[SESSION_END]]";
const SESSION_END_CLOSE: &str = "[[/SESSION_END]]";

/// Scans `cleaned` for the first complete summary block and parses its
/// JSON payload, if any.
pub fn find_summary_block(cleaned: &str) -> Option<SummaryEvent> {
    let body = extract_block(cleaned, SUMMARY_OPEN, SUMMARY_CLOSE)?;
    serde_json::from_str(body.trim()).ok()
}

/// Scans `cleaned` for the first complete session-end block.
pub fn find_session_end_block(cleaned: &str) -> Option<SessionEndEvent> {
    let body = extract_block(cleaned, SESSION_END_OPEN, SESSION_END_CLOSE)?;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Some(SessionEndEvent {
            summary: None,
            closed_by: None,
        });
    }
    serde_json::from_str(trimmed).ok().or(Some(SessionEndEvent {
        summary: Some(trimmed.to_string()),
        closed_by: None,
    }))
}

fn extract_block<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_block() {
        let text = r#"doing stuff
[[AGENT_SUMMARY]]
{"current_task": "fix bug", "completed_tasks": ["wrote test"], "decisions": [], "context": "", "files": ["a.rs"]}
[[/AGENT_SUMMARY]]
more output"#;
        let summary = find_summary_block(text).unwrap();
        assert_eq!(summary.current_task.as_deref(), Some("fix bug"));
        assert_eq!(summary.files, vec!["a.rs".to_string()]);
    }

    #[test]
    fn missing_summary_block_returns_none() {
        assert!(find_summary_block("nothing here").is_none());
    }

    #[test]
    fn parses_session_end_with_free_text_summary() {
        let text = "[[SESSION_END]]\nwrapped up the refactor\n[[/SESSION_END]]";
        let ev = find_session_end_block(text).unwrap();
        assert_eq!(ev.summary.as_deref(), Some("wrapped up the refactor"));
    }

    #[test]
    fn parses_session_end_json_payload() {
        let text = r#"[[SESSION_END]]{"summary": "done", "closed_by": "agent"}[[/SESSION_END]]"#;
        let ev = find_session_end_block(text).unwrap();
        assert_eq!(ev.summary.as_deref(), Some("done"));
        assert_eq!(ev.closed_by.as_deref(), Some("agent"));
    }
}
