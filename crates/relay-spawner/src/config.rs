//! Spawn requests, CLI profiles, and the shadow-agent data model
//! (§4.4).

use std::collections::HashMap;
use std::path::PathBuf;

/// How to invoke one supported CLI, resolved once at spawn time rather
/// than trusted to `$PATH` lookup inside the shell (§4.4 "avoid
/// `posix_spawnp` surprises").
#[derive(Debug, Clone)]
pub struct CliProfile {
    /// The binary name passed to `which` (not necessarily the same as the
    /// user-facing `cli` label, e.g. `"claude-code"` vs `"claude"`).
    pub binary: String,
    /// Arguments appended after the resolved binary and before the task,
    /// e.g. flags that disable interactive permission prompts.
    pub extra_args: Vec<String>,
    /// Whether this CLI's input widget can execute a line that looks like
    /// a shell prompt, forcing the backtick-guarded injection format
    /// (§4.2 step 3).
    pub gemini_like: bool,
}

impl CliProfile {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
            gemini_like: false,
        }
    }

    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = &'static str>) -> Self {
        self.extra_args = args.into_iter().map(str::to_string).collect();
        self
    }

    pub fn gemini_like(mut self) -> Self {
        self.gemini_like = true;
        self
    }
}

/// The built-in CLI profiles known out of the box; callers can extend or
/// override via [`SpawnerConfig::cli_profiles`].
pub fn default_cli_profiles() -> HashMap<String, CliProfile> {
    let mut profiles = HashMap::new();
    profiles.insert(
        "claude".to_string(),
        CliProfile::new("claude").with_extra_args(["--dangerously-skip-permissions"]),
    );
    profiles.insert("codex".to_string(), CliProfile::new("codex"));
    profiles.insert(
        "gemini".to_string(),
        CliProfile::new("gemini").gemini_like(),
    );
    profiles
}

/// A request to spawn one new wrapper (§4.4 "Spawn flow").
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub agent_name: String,
    pub cli: String,
    pub task: String,
    pub working_directory: PathBuf,
}

impl SpawnRequest {
    pub fn new(
        agent_name: impl Into<String>,
        cli: impl Into<String>,
        task: impl Into<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            cli: cli.into(),
            task: task.into(),
            working_directory: working_directory.into(),
        }
    }
}

/// When a shadow agent is (re)triggered (§4.4 "Shadow-agent pattern").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowTrigger {
    SessionEnd,
    CodeWritten,
    ReviewRequest,
    ExplicitAsk,
    AllMessages,
}

/// A role preset's default trigger set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePreset {
    Reviewer,
    Auditor,
    Active,
}

impl RolePreset {
    pub fn default_triggers(self) -> Vec<ShadowTrigger> {
        match self {
            RolePreset::Reviewer => vec![ShadowTrigger::ReviewRequest, ShadowTrigger::CodeWritten],
            RolePreset::Auditor => vec![ShadowTrigger::SessionEnd, ShadowTrigger::ExplicitAsk],
            RolePreset::Active => vec![ShadowTrigger::AllMessages],
        }
    }
}

/// A request to spawn a shadow agent alongside a primary (§4.4).
#[derive(Debug, Clone)]
pub struct ShadowSpawnRequest {
    pub primary: SpawnRequest,
    pub shadow_cli: String,
    pub shadow_task: String,
    pub role: RolePreset,
    /// `None` uses `role.default_triggers()`.
    pub triggers: Option<Vec<ShadowTrigger>>,
}

impl ShadowSpawnRequest {
    pub fn triggers(&self) -> Vec<ShadowTrigger> {
        self.triggers.clone().unwrap_or_else(|| self.role.default_triggers())
    }

    pub fn shadow_agent_name(&self) -> String {
        format!("{}-shadow", self.primary.agent_name)
    }
}

/// Tunables for the spawner itself (§4.4 "poll ... every 500 ms for up to
/// 30 s").
#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    pub registration_poll_ms: u64,
    pub registration_timeout_s: u64,
    pub log_dir: PathBuf,
    pub workers_file: PathBuf,
    pub cli_profiles: HashMap<String, CliProfile>,
    /// Base URL of the local dashboard HTTP API, used for the initial
    /// task send before falling back to direct PTY write.
    pub dashboard_base_url: Option<String>,
}

impl SpawnerConfig {
    pub fn new(log_dir: impl Into<PathBuf>, workers_file: impl Into<PathBuf>) -> Self {
        Self {
            registration_poll_ms: 500,
            registration_timeout_s: 30,
            log_dir: log_dir.into(),
            workers_file: workers_file.into(),
            cli_profiles: default_cli_profiles(),
            dashboard_base_url: None,
        }
    }
}
