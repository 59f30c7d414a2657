//! The spawner itself (C5, §4.4): creates wrappers, gates on
//! registration, persists workers metadata, and dispatches death
//! notifications.

use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use relay_pty::{PtyConfig, SpawnController, Wrapper, WrapperEvent, WrapperSpec};
use relay_router::Router;
use relay_types::{Envelope, EnvelopeKind};
use tracing::{info, warn};

use crate::config::{ShadowSpawnRequest, SpawnRequest, SpawnerConfig};
use crate::death::{AgentDeathEvent, DeathCallback, NoopDeathCallback};
use crate::error::{Result, SpawnError};
use crate::metadata::{WorkerRecord, WorkersFile};
use crate::policy::{build_initial_task, NoopPolicyProvider, PolicyProvider};

/// Owns every live wrapper. Held as `Arc<Spawner>`; the router only ever
/// sees each wrapper through a `Weak` handle (§9 "Cycles"), so dropping a
/// wrapper out of `wrappers` is what actually retires an agent.
pub struct Spawner {
    router: Arc<Router>,
    pty_config: PtyConfig,
    config: SpawnerConfig,
    policy: Arc<dyn PolicyProvider>,
    death_callback: Arc<dyn DeathCallback>,
    workers_file: WorkersFile,
    http_client: reqwest::Client,
    wrappers: SyncRwLock<std::collections::HashMap<String, Arc<Wrapper>>>,
    self_ref: OnceLock<Weak<Spawner>>,
}

impl Spawner {
    pub fn new(router: Arc<Router>, pty_config: PtyConfig, config: SpawnerConfig) -> Result<Arc<Self>> {
        let workers_file = WorkersFile::load(&config.workers_file)?;
        let spawner = Arc::new(Self {
            router,
            pty_config,
            config,
            policy: Arc::new(NoopPolicyProvider),
            death_callback: Arc::new(NoopDeathCallback),
            workers_file,
            http_client: reqwest::Client::new(),
            wrappers: SyncRwLock::new(std::collections::HashMap::new()),
            self_ref: OnceLock::new(),
        });
        let _ = spawner.self_ref.set(Arc::downgrade(&spawner));
        Ok(spawner)
    }

    pub fn with_policy_provider(mut self: Arc<Self>, policy: Arc<dyn PolicyProvider>) -> Arc<Self> {
        // `Arc::get_mut` only succeeds with no other strong/weak refs; at
        // construction time the caller is the sole owner, so this is safe
        // to use as a builder step immediately after `new`.
        if let Some(this) = Arc::get_mut(&mut self) {
            this.policy = policy;
        }
        self
    }

    pub fn with_death_callback(mut self: Arc<Self>, callback: Arc<dyn DeathCallback>) -> Arc<Self> {
        if let Some(this) = Arc::get_mut(&mut self) {
            this.death_callback = callback;
        }
        self
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.wrappers.read().keys().cloned().collect()
    }

    pub fn get(&self, agent_name: &str) -> Option<Arc<Wrapper>> {
        self.wrappers.read().get(agent_name).cloned()
    }

    pub fn workers(&self) -> Vec<WorkerRecord> {
        self.workers_file.list()
    }

    /// Spawns one new wrapper, gates on registration, then delivers the
    /// initial task (§4.4 "Spawn flow").
    pub async fn spawn(self: &Arc<Self>, request: &SpawnRequest) -> Result<Arc<Wrapper>> {
        if self.wrappers.read().contains_key(&request.agent_name) {
            return Err(SpawnError::NameCollision(request.agent_name.clone()));
        }

        let profile = self
            .config
            .cli_profiles
            .get(&request.cli)
            .cloned()
            .unwrap_or_else(|| crate::config::CliProfile::new(request.cli.clone()));

        let binary_path = which::which(&profile.binary)
            .map_err(|_| SpawnError::ExecutableNotFound(request.cli.clone()))?;

        let mut command_parts = vec![shell_quote(&binary_path.to_string_lossy())];
        command_parts.extend(profile.extra_args.iter().map(|a| shell_quote(a)));
        let command_line = command_parts.join(" ");

        let mut spec = WrapperSpec::new(
            request.agent_name.clone(),
            request.cli.clone(),
            command_line,
            request.working_directory.clone(),
            self.config.log_dir.clone(),
        );
        spec.gemini_like = profile.gemini_like;

        let spawn_controller: Arc<dyn SpawnController> = self.clone();
        let wrapper = Wrapper::start(spec, self.pty_config.clone(), self.router.clone(), spawn_controller).await?;

        self.router.register(wrapper.clone());
        self.wrappers.write().insert(request.agent_name.clone(), wrapper.clone());
        self.watch_for_exit(wrapper.clone(), request.agent_name.clone(), request.cli.clone());

        if !self.wait_for_registration(&wrapper, &request.agent_name).await {
            self.retire(&request.agent_name).await;
            let _ = wrapper.kill().await;
            return Err(SpawnError::RegistrationTimeout {
                name: request.agent_name.clone(),
                timeout_s: self.config.registration_timeout_s,
            });
        }

        self.workers_file.upsert(WorkerRecord {
            agent_name: request.agent_name.clone(),
            cli: request.cli.clone(),
            started_at: now_ms(),
            shadow_of: None,
        })?;

        self.deliver_initial_task(&wrapper, &request.agent_name, &request.cli, &request.task)
            .await;

        info!(agent = %request.agent_name, cli = %request.cli, "agent spawned");
        Ok(wrapper)
    }

    /// Spawns a primary agent, then attempts a shadow alongside it. Shadow
    /// failure degrades to "primary only" with a warning (§4.4).
    pub async fn spawn_shadow(
        self: &Arc<Self>,
        request: &ShadowSpawnRequest,
    ) -> Result<(Arc<Wrapper>, Option<Arc<Wrapper>>)> {
        let primary = self.spawn(&request.primary).await?;

        let shadow_request = SpawnRequest::new(
            request.shadow_agent_name(),
            request.shadow_cli.clone(),
            request.shadow_task.clone(),
            request.primary.working_directory.clone(),
        );

        match self.spawn(&shadow_request).await {
            Ok(shadow) => {
                if let Err(err) = self.workers_file.upsert(WorkerRecord {
                    agent_name: shadow_request.agent_name.clone(),
                    cli: shadow_request.cli.clone(),
                    started_at: now_ms(),
                    shadow_of: Some(request.primary.agent_name.clone()),
                }) {
                    warn!(%err, "failed to persist shadow worker metadata");
                }
                Ok((primary, Some(shadow)))
            }
            Err(err) => {
                warn!(primary = %request.primary.agent_name, %err, "shadow spawn failed, continuing with primary only");
                Ok((primary, None))
            }
        }
    }

    /// Gracefully stops and unregisters `agent_name`.
    pub async fn release(&self, agent_name: &str) -> Result<()> {
        self.retire(agent_name).await;
        if let Some(wrapper) = self.wrappers.write().remove(agent_name) {
            wrapper.stop(Duration::from_secs(5)).await?;
        }
        Ok(())
    }

    async fn retire(&self, agent_name: &str) {
        self.router.unregister(agent_name);
        let _ = self.workers_file.remove(agent_name);
    }

    async fn wait_for_registration(&self, wrapper: &Arc<Wrapper>, name: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(self.config.registration_timeout_s);
        loop {
            if !wrapper.is_running() {
                return false;
            }
            if self.router.get_agents().iter().any(|a| a == name) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(self.config.registration_poll_ms)).await;
        }
    }

    async fn deliver_initial_task(&self, wrapper: &Arc<Wrapper>, agent_name: &str, cli: &str, task: &str) {
        let full_task = build_initial_task(self.policy.as_ref(), agent_name, cli, task);

        if let Some(base_url) = &self.config.dashboard_base_url {
            let envelope = Envelope::new("spawner", agent_name, EnvelopeKind::Message, full_task.clone());
            if let Ok(envelope) = envelope {
                let sent = self
                    .http_client
                    .post(format!("{base_url}/api/envelopes"))
                    .json(&envelope)
                    .send()
                    .await
                    .map(|resp| resp.status().is_success())
                    .unwrap_or(false);
                if sent {
                    return;
                }
            }
            warn!(agent = %agent_name, "dashboard send failed, falling back to direct pty write");
        }

        if let Err(err) = wrapper.write(format!("{full_task}\r").as_bytes()) {
            warn!(agent = %agent_name, %err, "failed to write initial task directly to pty");
        }
    }

    fn watch_for_exit(self: &Arc<Self>, wrapper: Arc<Wrapper>, agent_name: String, cli: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut events = wrapper.subscribe();
            while let Some(event) = events.recv().await {
                if let WrapperEvent::Exit(code) = event {
                    this.retire(&agent_name).await;
                    this.wrappers.write().remove(&agent_name);
                    if let Some(code) = code {
                        if code != 0 {
                            this.death_callback
                                .on_agent_death(AgentDeathEvent {
                                    agent_name: agent_name.clone(),
                                    cli: cli.clone(),
                                    exit_code: code,
                                    resume_hint: None,
                                })
                                .await;
                        }
                    }
                    break;
                }
            }
        });
    }
}

#[async_trait]
impl SpawnController for Spawner {
    async fn on_spawn(&self, name: &str, cli: &str, task: &str) {
        let Some(this) = self.self_ref.get().and_then(Weak::upgrade) else {
            return;
        };
        let working_directory = std::env::current_dir().unwrap_or_else(|_| ".".into());
        let request = SpawnRequest::new(name, cli, task, working_directory);
        if let Err(err) = this.spawn(&request).await {
            warn!(agent = %name, %err, "nested spawn request failed");
        }
    }

    async fn on_release(&self, name: &str) {
        let Some(this) = self.self_ref.get().and_then(Weak::upgrade) else {
            return;
        };
        if let Err(err) = this.release(name).await {
            warn!(agent = %name, %err, "release request failed");
        }
    }
}

fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_leaves_plain_tokens_bare() {
        assert_eq!(shell_quote("claude"), "claude");
        assert_eq!(shell_quote("/usr/bin/claude"), "/usr/bin/claude");
    }

    #[test]
    fn shell_quote_escapes_special_characters() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
