//! The sync queue engine: in-memory buffering, flush triggers, and the
//! retry/spill fallback (§4.7).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use relay_router::sink::EnvelopeSink;
use relay_types::Envelope;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client::{maybe_compress, post_with_retry};
use crate::config::SyncConfig;
use crate::spill::SpillStore;
use crate::stats::{SyncStats, SyncStatsSnapshot};

/// Ships every envelope handed to it to a remote endpoint, best-effort
/// durable via a spill directory. Implements [`EnvelopeSink`] so the
/// router can enqueue directly; `relay-daemon` wires this in only when
/// cloud mode is enabled.
pub struct SyncQueue {
    tx: SyncMutex<Option<mpsc::UnboundedSender<Envelope>>>,
    stats: Arc<SyncStats>,
    spill: SpillStore,
    worker: SyncMutex<Option<JoinHandle<()>>>,
}

impl SyncQueue {
    /// Starts the background flush task and returns a handle to it.
    pub fn spawn(config: SyncConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SyncStats::default());
        let spill = SpillStore::new(config.spill_dir.clone(), config.spill_cap);
        let client = Client::new();
        let flush_lock = Arc::new(AsyncMutex::new(()));

        let handle = tokio::spawn(run_flush_loop(
            rx,
            config,
            client,
            stats.clone(),
            spill.clone(),
            flush_lock,
        ));

        Arc::new(Self {
            tx: SyncMutex::new(Some(tx)),
            stats,
            spill,
            worker: SyncMutex::new(Some(handle)),
        })
    }

    /// Pushes `envelope` onto the queue without blocking the caller.
    pub fn enqueue(&self, envelope: Envelope) {
        let guard = self.tx.lock();
        match guard.as_ref() {
            Some(tx) if tx.send(envelope).is_ok() => {}
            _ => warn!("sync queue is closed, dropping envelope"),
        }
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    /// Scans the spill directory and attempts to replay each file in age
    /// order, using `client`/`config` for the actual POST. Replay errors
    /// are non-fatal: the file is left in place and retried on the next
    /// call (§4.7 "Recovery").
    pub async fn recover_spilled(&self, client: &Client, config: &SyncConfig) {
        for path in self.spill.list() {
            let batch = match self.spill.read(&path) {
                Ok(batch) => batch,
                Err(err) => {
                    error!(path = %path.display(), %err, "failed to read spill file, skipping");
                    continue;
                }
            };
            let Ok(payload) = serde_json::to_vec(&batch) else {
                continue;
            };
            let Ok((body, gzip)) = maybe_compress(&payload, config.compression_threshold_bytes) else {
                continue;
            };
            match post_with_retry(client, config, &body, gzip).await {
                Ok(ack) => {
                    self.stats.record_synced(batch.len() as u64, body.len() as u64, ack.duplicates);
                    self.stats.record_recovered(batch.len() as u64);
                    if let Err(err) = self.spill.remove(&path) {
                        warn!(path = %path.display(), %err, "failed to unlink replayed spill file");
                    }
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "spill replay failed, will retry later");
                }
            }
        }
    }

    /// Closes the enqueue side and waits for the background task to drain
    /// and flush everything still buffered (§4.7 invariant: "`close()`
    /// drains pending messages before returning").
    pub async fn close(&self) {
        self.tx.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(%err, "sync queue worker task panicked");
            }
        }
    }
}

impl EnvelopeSink for SyncQueue {
    fn on_accepted(&self, envelope: &Envelope) {
        self.enqueue(envelope.clone());
    }
}

async fn run_flush_loop(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    config: SyncConfig,
    client: Client,
    stats: Arc<SyncStats>,
    spill: SpillStore,
    flush_lock: Arc<AsyncMutex<()>>,
) {
    let mut buffer: Vec<Envelope> = Vec::new();
    let mut buffer_bytes: usize = 0;
    let mut first_enqueued_at: Option<Instant> = None;

    loop {
        let sleep_for = match first_enqueued_at {
            Some(start) => {
                let window = Duration::from_millis(config.flush_interval_ms);
                let elapsed = start.elapsed();
                if elapsed >= window {
                    Duration::ZERO
                } else {
                    window - elapsed
                }
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(envelope) => {
                        if first_enqueued_at.is_none() {
                            first_enqueued_at = Some(Instant::now());
                        }
                        buffer_bytes += estimate_size(&envelope);
                        buffer.push(envelope);
                        if buffer.len() >= config.flush_count || buffer_bytes >= config.flush_bytes {
                            flush(&mut buffer, &mut buffer_bytes, &mut first_enqueued_at, &config, &client, &stats, &spill, &flush_lock).await;
                        }
                    }
                    None => {
                        flush(&mut buffer, &mut buffer_bytes, &mut first_enqueued_at, &config, &client, &stats, &spill, &flush_lock).await;
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(sleep_for), if first_enqueued_at.is_some() => {
                flush(&mut buffer, &mut buffer_bytes, &mut first_enqueued_at, &config, &client, &stats, &spill, &flush_lock).await;
            }
        }
    }
    info!("sync queue worker exiting after drain");
}

#[allow(clippy::too_many_arguments)]
async fn flush(
    buffer: &mut Vec<Envelope>,
    buffer_bytes: &mut usize,
    first_enqueued_at: &mut Option<Instant>,
    config: &SyncConfig,
    client: &Client,
    stats: &Arc<SyncStats>,
    spill: &SpillStore,
    flush_lock: &Arc<AsyncMutex<()>>,
) {
    if buffer.is_empty() {
        return;
    }
    let batch = std::mem::take(buffer);
    *buffer_bytes = 0;
    *first_enqueued_at = None;

    let _guard = flush_lock.lock().await;

    let payload = match serde_json::to_vec(&batch) {
        Ok(p) => p,
        Err(err) => {
            error!(%err, "failed to serialize sync batch, dropping");
            return;
        }
    };
    let (body, gzip) = match maybe_compress(&payload, config.compression_threshold_bytes) {
        Ok(pair) => pair,
        Err(err) => {
            error!(%err, "failed to compress sync batch, sending uncompressed");
            (payload, false)
        }
    };

    match post_with_retry(client, config, &body, gzip).await {
        Ok(ack) => {
            stats.record_synced(batch.len() as u64, body.len() as u64, ack.duplicates);
        }
        Err(err) => {
            warn!(%err, batch_size = batch.len(), "sync batch exhausted retries, spilling to disk");
            stats.record_spilled(batch.len() as u64);
            if let Err(err) = spill.write_batch(&batch) {
                error!(%err, "failed to write spill file");
            }
        }
    }
}

fn estimate_size(envelope: &Envelope) -> usize {
    serde_json::to_vec(envelope).map(|v| v.len()).unwrap_or(envelope.body.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::EnvelopeKind;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint_url: String, spill_dir: std::path::PathBuf) -> SyncConfig {
        SyncConfig {
            endpoint_url,
            bearer_token: "test-token".into(),
            flush_count: 5,
            flush_interval_ms: 20,
            flush_bytes: 1024 * 1024,
            compression_threshold_bytes: 1024,
            max_retries: 0,
            retry_backoff_ms: 5,
            spill_dir,
            spill_cap: 100,
        }
    }

    /// S4: a finally-healthy endpoint that rejects everything at first
    /// forces a spill, and `recover_spilled` drains it once it recovers.
    #[tokio::test]
    async fn s4_spill_and_recover_round_trip() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let spill_dir = tempfile::tempdir().unwrap();
        let config = test_config(mock_server.uri(), spill_dir.path().to_path_buf());

        let queue = SyncQueue::spawn(config.clone());
        for i in 0..5 {
            let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, format!("msg {i}")).unwrap();
            queue.enqueue(env);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.close().await;

        let spilled = std::fs::read_dir(spill_dir.path()).unwrap().count();
        assert!(spilled >= 1, "expected at least one spill file after the endpoint rejected every POST");

        mock_server.reset().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "duplicates": 0 })))
            .mount(&mock_server)
            .await;

        let recovery = SyncQueue::spawn(config.clone());
        let client = reqwest::Client::new();
        recovery.recover_spilled(&client, &config).await;
        recovery.close().await;

        let remaining = std::fs::read_dir(spill_dir.path()).unwrap().count();
        assert_eq!(remaining, 0, "spill directory should be empty once recovery succeeds");
        assert_eq!(recovery.stats().recovered, 5);
    }
}
