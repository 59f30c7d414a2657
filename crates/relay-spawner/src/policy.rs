//! Per-agent prompt preamble injected ahead of the initial task (§4.4:
//! "prepend (a) the relay-communication snippet ... and (b) any policy
//! instructions an injected `PolicyProvider` trait produces").

/// The relay-communication snippet taught to every spawned agent so it
/// knows how to emit `->relay:`/`->thinking:` commands.
pub const RELAY_COMMUNICATION_SNIPPET: &str = concat!(
    "You are connected to a relay. To message another agent, write a line ",
    "starting with `->relay:<AgentName> <message>` (use `->relay:*` to ",
    "broadcast). For a multi-line message, fence the body between `<<<` and ",
    "`>>>`. Prefix a line with `->thinking:` instead of `->relay:` for ",
    "reasoning that should not reach the addressee's task stream.",
);

/// Supplies agent-specific policy text to prepend to a spawned agent's
/// initial task (e.g. house rules, escalation paths). Shipped as a no-op
/// default; daemons that want per-role policy inject their own
/// implementation at construction.
pub trait PolicyProvider: Send + Sync {
    /// Returns additional instructions for `agent_name` running `cli`, or
    /// `None` if this agent has no extra policy.
    fn policy_for(&self, agent_name: &str, cli: &str) -> Option<String>;
}

pub struct NoopPolicyProvider;

impl PolicyProvider for NoopPolicyProvider {
    fn policy_for(&self, _agent_name: &str, _cli: &str) -> Option<String> {
        None
    }
}

/// Builds the full initial-task text: the relay snippet, any policy text,
/// then the caller's task.
pub fn build_initial_task(policy: &dyn PolicyProvider, agent_name: &str, cli: &str, task: &str) -> String {
    let mut parts = vec![RELAY_COMMUNICATION_SNIPPET.to_string()];
    if let Some(extra) = policy.policy_for(agent_name, cli) {
        parts.push(extra);
    }
    parts.push(task.to_string());
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_policy_adds_only_the_relay_snippet() {
        let text = build_initial_task(&NoopPolicyProvider, "Dev", "claude", "fix the bug");
        assert!(text.starts_with(RELAY_COMMUNICATION_SNIPPET));
        assert!(text.ends_with("fix the bug"));
    }

    #[test]
    fn policy_text_is_inserted_between_snippet_and_task() {
        struct Fixed;
        impl PolicyProvider for Fixed {
            fn policy_for(&self, _agent_name: &str, _cli: &str) -> Option<String> {
                Some("Always write tests first.".to_string())
            }
        }
        let text = build_initial_task(&Fixed, "Dev", "claude", "fix the bug");
        let snippet_pos = text.find(RELAY_COMMUNICATION_SNIPPET).unwrap();
        let policy_pos = text.find("Always write tests first.").unwrap();
        let task_pos = text.find("fix the bug").unwrap();
        assert!(snippet_pos < policy_pos);
        assert!(policy_pos < task_pos);
    }
}
