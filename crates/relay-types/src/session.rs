//! Sessions: one live run of one agent, and its last self-reported summary.

use serde::{Deserialize, Serialize};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedBy {
    /// The agent emitted a `[[SESSION_END]]` marker itself.
    Agent,
    /// The wrapper's connection to the router dropped.
    Disconnect,
    /// The child process exited with an error.
    Error,
}

/// One live run of one agent, from registration to exit (§3 `Session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent_name: String,
    pub cli: String,
    pub project_id: Option<String>,
    pub project_root: Option<String>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<ClosedBy>,
}

impl Session {
    pub fn start(
        id: impl Into<String>,
        agent_name: impl Into<String>,
        cli: impl Into<String>,
        project_id: Option<String>,
        project_root: Option<String>,
        started_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            agent_name: agent_name.into(),
            cli: cli.into(),
            project_id,
            project_root,
            started_at,
            ended_at: None,
            message_count: 0,
            summary: None,
            closed_by: None,
        }
    }

    /// Ends the session exactly once; `ended_at`/`closed_by` are set only on
    /// the first call. `new_summary = None` preserves any previously-set
    /// summary instead of silently overwriting it (§4.5 `end_session`).
    pub fn end(&mut self, ended_at: i64, closed_by: ClosedBy, new_summary: Option<String>) {
        if self.ended_at.is_some() {
            return;
        }
        self.ended_at = Some(ended_at);
        self.closed_by = Some(closed_by);
        if let Some(summary) = new_summary {
            self.summary = Some(summary);
        }
    }

    pub fn increment_message_count(&mut self) {
        self.message_count += 1;
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Filter parameters for `MessageStore::get_sessions`.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub agent_name: Option<String>,
    pub project_id: Option<String>,
    pub active_only: bool,
}

/// Last-known self-reported state of an agent (§3 `AgentSummary`).
///
/// `agent_name` is the primary key: a `save_agent_summary` call always
/// overwrites in place, there is only ever one row per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_name: String,
    pub project_id: Option<String>,
    pub last_updated: i64,
    pub current_task: Option<String>,
    pub completed_tasks: Vec<String>,
    pub decisions: Vec<String>,
    pub context: Option<String>,
    pub files: Vec<String>,
}

impl AgentSummary {
    pub fn new(agent_name: impl Into<String>, last_updated: i64) -> Self {
        Self {
            agent_name: agent_name.into(),
            project_id: None,
            last_updated,
            current_task: None,
            completed_tasks: Vec::new(),
            decisions: Vec::new(),
            context: None,
            files: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_session_preserves_existing_summary_when_new_is_none() {
        let mut session = Session::start("s1", "Dev", "claude", None, None, 0);
        session.summary = Some("did the thing".to_string());
        session.end(1000, ClosedBy::Agent, None);
        assert_eq!(session.summary.as_deref(), Some("did the thing"));
        assert_eq!(session.ended_at, Some(1000));
    }

    #[test]
    fn end_session_is_idempotent() {
        let mut session = Session::start("s1", "Dev", "claude", None, None, 0);
        session.end(1000, ClosedBy::Agent, Some("first".to_string()));
        session.end(2000, ClosedBy::Error, Some("second".to_string()));
        assert_eq!(session.ended_at, Some(1000));
        assert_eq!(session.summary.as_deref(), Some("first"));
        assert_eq!(session.closed_by, Some(ClosedBy::Agent));
    }

    #[test]
    fn message_count_increments() {
        let mut session = Session::start("s1", "Dev", "claude", None, None, 0);
        session.increment_message_count();
        session.increment_message_count();
        assert_eq!(session.message_count, 2);
    }
}
