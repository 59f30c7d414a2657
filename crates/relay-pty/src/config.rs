//! Timing and sizing knobs for the PTY wrapper (§3.1 `PtyConfig`, §6).

/// Wrapper-wide tunables. All durations are milliseconds to match the
/// env/TOML/CLI configuration surface (§6), converted to `Duration` at the
/// call site.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub max_buffer_lines: usize,
    pub stability_timeout_ms: u64,
    pub stability_poll_ms: u64,
    pub required_stable_polls: u32,
    pub verification_timeout_ms: u64,
    pub enter_delay_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
    pub queue_process_delay_ms: u64,
    pub dedup_capacity: usize,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            max_buffer_lines: 10_000,
            stability_timeout_ms: 3_000,
            stability_poll_ms: 200,
            required_stable_polls: 2,
            verification_timeout_ms: 2_000,
            enter_delay_ms: 50,
            retry_backoff_ms: 300,
            max_retries: 3,
            queue_process_delay_ms: 500,
            dedup_capacity: 4_096,
        }
    }
}

/// One wrapper's identity and how to start its child process (§4.2
/// `start`, §6 registration handshake fields `agent_name`/`cli`/
/// `working_directory`).
#[derive(Debug, Clone)]
pub struct WrapperSpec {
    /// The address this wrapper registers under in the router.
    pub agent_name: String,
    /// A human label for the CLI being wrapped (e.g. `"claude"`), carried
    /// in the registration handshake and the session record.
    pub cli: String,
    /// The full command line run inside the PTY, executed via a shell so
    /// `$PATH`, symlinks, and scripts resolve uniformly (§4.2 `start`).
    pub command_line: String,
    pub working_directory: std::path::PathBuf,
    /// Directory the per-agent rolling log file is written into (§6).
    pub log_dir: std::path::PathBuf,
    /// True for CLIs (Gemini-like) whose input widget can execute a line
    /// that looks like a shell prompt; injection aborts rather than risk
    /// executing the message as a command (§4.2 step 3).
    pub gemini_like: bool,
    pub relay_prefix: String,
    pub thinking_prefix: String,
}

impl WrapperSpec {
    pub fn new(
        agent_name: impl Into<String>,
        cli: impl Into<String>,
        command_line: impl Into<String>,
        working_directory: impl Into<std::path::PathBuf>,
        log_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            cli: cli.into(),
            command_line: command_line.into(),
            working_directory: working_directory.into(),
            log_dir: log_dir.into(),
            gemini_like: false,
            relay_prefix: relay_patterns::DEFAULT_RELAY_PREFIX.to_string(),
            thinking_prefix: relay_patterns::DEFAULT_THINKING_PREFIX.to_string(),
        }
    }
}
