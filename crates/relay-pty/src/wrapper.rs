//! Owns one child process in a pseudo-terminal, turning it into a
//! full-duplex message channel (C3, §4.2).

use std::io::{Read, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use relay_patterns::PatternSet;
use relay_router::{InjectionOutcome, InjectionTarget, Router};
use relay_types::Envelope;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, warn};

use crate::buffer::OutputBuffer;
use crate::config::{PtyConfig, WrapperSpec};
use crate::dedup::DedupSet;
use crate::error::{PtyError, Result};
use crate::events::{find_session_end_block, find_summary_block, WrapperEvent};
use crate::format::{format_injection_line, format_injection_line_guarded, verification_marker};
use crate::metrics::{InjectionMetrics, InjectionMetricsSnapshot};
use crate::parser::{parse_outbound, OutboundCommand};
use crate::spawn_controller::SpawnController;

const PTY_ROWS: u16 = 40;
const PTY_COLS: u16 = 120;

/// A running wrapper. Cheap to share: held as `Arc<Wrapper>` by the
/// spawner (strong, owning) and by the router (weak, see
/// `relay_router::Registry`).
pub struct Wrapper {
    spec: WrapperSpec,
    pty_config: PtyConfig,
    patterns: Arc<PatternSet>,
    router: Arc<Router>,
    spawn_controller: Arc<dyn SpawnController>,

    buffer: SyncMutex<OutputBuffer>,
    dedup: SyncMutex<DedupSet>,
    writer: SyncMutex<Box<dyn std::io::Write + Send>>,
    #[allow(dead_code)]
    master: SyncMutex<Box<dyn MasterPty + Send>>,
    child: AsyncMutex<Box<dyn Child + Send + Sync>>,
    log_file: SyncMutex<std::fs::File>,

    running: AtomicBool,
    metrics: InjectionMetrics,
    /// Serializes injections and provides FIFO ordering per target: the
    /// router may call `inject` concurrently (e.g. during a broadcast),
    /// but only one write is ever in flight, and `tokio::sync::Mutex`
    /// wakes waiters in acquisition order (§4.2 "Only one injection may
    /// be in flight per wrapper ... queue in FIFO order").
    injection_lock: AsyncMutex<()>,
    last_injection_at: AsyncMutex<Option<Instant>>,

    output_subs: SyncMutex<Vec<mpsc::UnboundedSender<WrapperEvent>>>,
}

impl Wrapper {
    /// Allocates a PTY, spawns `spec.command_line` via a shell, and starts
    /// the background output-reader and exit-watcher tasks (§4.2 `start`).
    pub async fn start(
        spec: WrapperSpec,
        pty_config: PtyConfig,
        router: Arc<Router>,
        spawn_controller: Arc<dyn SpawnController>,
    ) -> Result<Arc<Self>> {
        let patterns = relay_patterns::compiled(&spec.relay_prefix, &spec.thinking_prefix);

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new("/bin/sh");
        cmd.arg("-c");
        cmd.arg(&spec.command_line);
        cmd.cwd(&spec.working_directory);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // The slave side is only needed to spawn the child; drop it so EOF
        // on the master's reader is observable once the child exits.
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        std::fs::create_dir_all(&spec.log_dir)?;
        let log_path = spec.log_dir.join(format!("{}.log", spec.agent_name));
        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        writeln!(
            log_file,
            "--- Worker {} started at {} ---",
            spec.agent_name,
            now_iso8601()
        )?;

        let wrapper = Arc::new(Self {
            pty_config: pty_config.clone(),
            patterns,
            router,
            spawn_controller,
            buffer: SyncMutex::new(OutputBuffer::new(pty_config.max_buffer_lines)),
            dedup: SyncMutex::new(DedupSet::new(pty_config.dedup_capacity)),
            writer: SyncMutex::new(writer),
            master: SyncMutex::new(pair.master),
            child: AsyncMutex::new(child),
            log_file: SyncMutex::new(log_file),
            running: AtomicBool::new(true),
            metrics: InjectionMetrics::default(),
            injection_lock: AsyncMutex::new(()),
            last_injection_at: AsyncMutex::new(None),
            output_subs: SyncMutex::new(Vec::new()),
            spec,
        });

        wrapper.clone().spawn_reader_task(reader);
        wrapper.clone().spawn_exit_watcher();

        Ok(wrapper)
    }

    pub fn agent_name_str(&self) -> &str {
        &self.spec.agent_name
    }

    pub fn cli(&self) -> &str {
        &self.spec.cli
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Raw write to the PTY.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_running() {
            return Err(PtyError::NotRunning(self.spec.agent_name.clone()));
        }
        let mut writer = self.writer.lock();
        writer.write_all(bytes).map_err(|e| PtyError::Write(e.to_string()))?;
        writer.flush().map_err(|e| PtyError::Write(e.to_string()))
    }

    /// The last `limit` cleaned output lines, or all captured lines.
    pub fn get_output(&self, limit: Option<usize>) -> Vec<String> {
        self.buffer.lock().output(limit)
    }

    /// The raw, unstripped byte history (bounded by the reader loop, not
    /// by the cleaned-line cap).
    pub fn get_raw_output(&self) -> String {
        self.buffer.lock().raw_output().to_string()
    }

    pub fn injection_metrics(&self) -> InjectionMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Subscribes to this wrapper's typed events
    /// (`output`/`summary`/`session-end`/`exit`).
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WrapperEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.output_subs.lock().push(tx);
        rx
    }

    /// Graceful stop: SIGINT, then a hard kill after `grace` if the child
    /// hasn't exited.
    pub async fn stop(&self, grace: Duration) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        // Write ^C into the pty first; every interactive CLI we wrap treats
        // that the same as a terminal-delivered SIGINT, giving it a chance
        // to flush state before the hard kill below.
        let _ = self.write(&[0x03]);
        tokio::time::sleep(grace).await;
        self.kill().await
    }

    /// Immediate termination.
    pub async fn kill(&self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        let mut child = self.child.lock().await;
        child.kill().map_err(|e| PtyError::Write(e.to_string()))
    }

    fn spawn_reader_task(self: Arc<Self>, mut reader: Box<dyn Read + Send>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        // Blocking PTY reads happen on a dedicated OS thread; the chunk is
        // handed to an async task over an unbounded channel so parsing and
        // routing (which await) never block the reader.
        std::thread::spawn(move || loop {
            let mut buf = [0u8; 4096];
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                self.on_chunk(&chunk).await;
            }
        });
    }

    fn spawn_exit_watcher(self: Arc<Self>) {
        tokio::spawn(async move {
            let code = loop {
                {
                    let mut child = self.child.lock().await;
                    if let Ok(Some(status)) = child.try_wait() {
                        break status.exit_code() as i32;
                    }
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            };
            self.running.store(false, Ordering::Relaxed);
            {
                let mut f = self.log_file.lock();
                let _ = writeln!(
                    f,
                    "--- Worker {} stopped at {} ---",
                    self.spec.agent_name,
                    now_iso8601()
                );
            }
            self.emit(WrapperEvent::Exit(Some(code)));
        });
    }

    async fn on_chunk(self: &Arc<Self>, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk).into_owned();
        {
            let mut log = self.log_file.lock();
            let _ = log.write_all(text.as_bytes());
        }
        self.emit(WrapperEvent::Output(text.clone()));

        let cleaned = {
            let mut buffer = self.buffer.lock();
            buffer.push(&text);
            buffer.cleaned()
        };

        if let Some(summary) = find_summary_block(&cleaned) {
            self.emit(WrapperEvent::Summary(summary));
        }
        if let Some(end) = find_session_end_block(&cleaned) {
            self.emit(WrapperEvent::SessionEnd(end));
        }

        let commands = {
            let mut dedup = self.dedup.lock();
            parse_outbound(&cleaned, &self.patterns, &mut dedup)
        };

        for command in commands {
            self.handle_outbound(command).await;
        }
    }

    async fn handle_outbound(&self, command: OutboundCommand) {
        match command {
            OutboundCommand::Send {
                project: _project,
                target,
                body,
                kind,
            } => match Envelope::new(self.spec.agent_name.clone(), target, kind, body) {
                Ok(envelope) => {
                    if let Err(err) = self.router.route(envelope).await {
                        warn!(agent = %self.spec.agent_name, %err, "router rejected outbound envelope");
                    }
                }
                Err(err) => warn!(agent = %self.spec.agent_name, %err, "invalid outbound envelope"),
            },
            OutboundCommand::Spawn { name, cli, task } => {
                self.spawn_controller.on_spawn(&name, &cli, &task).await;
            }
            OutboundCommand::Release { name } => {
                self.spawn_controller.on_release(&name).await;
            }
        }
    }

    fn emit(&self, event: WrapperEvent) {
        let mut subs = self.output_subs.lock();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Polls the captured buffer until it is byte-identical across
    /// `required_stable_polls` consecutive polls, or `stability_timeout_ms`
    /// elapses, whichever comes first (§4.2 step 2).
    async fn wait_for_stability(&self) {
        let deadline = Instant::now() + Duration::from_millis(self.pty_config.stability_timeout_ms);
        let mut previous = self.get_raw_output();
        let mut stable_polls = 0u32;

        while Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(self.pty_config.stability_poll_ms)).await;
            let current = self.get_raw_output();
            if current == previous {
                stable_polls += 1;
                if stable_polls >= self.pty_config.required_stable_polls {
                    return;
                }
            } else {
                stable_polls = 0;
                previous = current;
            }
        }
    }

    /// Polls captured output for `marker`, for up to
    /// `verification_timeout_ms`.
    async fn verify_within(&self, marker: &str) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.pty_config.verification_timeout_ms);
        loop {
            if self.get_raw_output().contains(marker) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(self.pty_config.stability_poll_ms.min(100))).await;
        }
    }

    /// Aborts injection for CLIs whose input widget would execute a line
    /// that looks like a shell prompt (§4.2 step 3).
    fn looks_like_shell_prompt(&self) -> bool {
        self.get_output(Some(1))
            .last()
            .map(|line| line.trim_end().ends_with('$'))
            .unwrap_or(false)
    }

    /// Builds, writes, and verifies one injection attempt, retrying per
    /// §4.2 steps 5-6.
    async fn do_injection(&self, envelope: &Envelope) -> InjectionOutcome {
        let marker = verification_marker(envelope);

        for attempt in 1..=self.pty_config.max_retries {
            if attempt > 1 {
                // A previous write may have verified after its own window
                // closed; count that as late-verified success rather than
                // writing the message twice.
                if self.get_raw_output().contains(&marker) {
                    return InjectionOutcome::VerifiedRetried;
                }
                tokio::time::sleep(Duration::from_millis(
                    self.pty_config.retry_backoff_ms * u64::from(attempt),
                ))
                .await;
            }

            self.wait_for_stability().await;

            if self.spec.gemini_like && self.looks_like_shell_prompt() {
                warn!(agent = %self.spec.agent_name, "aborting injection: last line looks like a shell prompt");
                continue;
            }

            let line = if self.spec.gemini_like {
                format_injection_line_guarded(envelope)
            } else {
                format_injection_line(envelope)
            };

            if self.write(line.as_bytes()).is_err() {
                continue;
            }
            tokio::time::sleep(Duration::from_millis(self.pty_config.enter_delay_ms)).await;
            if self.write(b"\r").is_err() {
                continue;
            }

            if self.verify_within(&marker).await {
                return if attempt == 1 {
                    InjectionOutcome::VerifiedFirstTry
                } else {
                    InjectionOutcome::VerifiedRetried
                };
            }
        }

        error!(agent = %self.spec.agent_name, envelope = %envelope.id, "injection not verified after retries");
        InjectionOutcome::Failed
    }
}

#[async_trait]
impl InjectionTarget for Wrapper {
    fn agent_name(&self) -> &str {
        &self.spec.agent_name
    }

    async fn inject(&self, envelope: Envelope) -> InjectionOutcome {
        let _permit = self.injection_lock.lock().await;

        {
            let mut last = self.last_injection_at.lock().await;
            if let Some(prev) = *last {
                let gap = Duration::from_millis(self.pty_config.queue_process_delay_ms);
                let elapsed = prev.elapsed();
                if elapsed < gap {
                    tokio::time::sleep(gap - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        let outcome = self.do_injection(&envelope).await;
        self.metrics.record(outcome);
        outcome
    }
}

fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
