//! Death notification (§4.4: "if exit code is non-zero and non-null, fire
//! an `on_agent_death` callback including a resume hint if a session
//! identifier is known").

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct AgentDeathEvent {
    pub agent_name: String,
    pub cli: String,
    pub exit_code: i32,
    /// A session identifier the caller can use to resume, if the CLI
    /// reported one during its run.
    pub resume_hint: Option<String>,
}

#[async_trait]
pub trait DeathCallback: Send + Sync {
    async fn on_agent_death(&self, event: AgentDeathEvent);
}

pub struct NoopDeathCallback;

#[async_trait]
impl DeathCallback for NoopDeathCallback {
    async fn on_agent_death(&self, _event: AgentDeathEvent) {}
}
