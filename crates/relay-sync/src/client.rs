//! Batch compression and the retrying HTTP POST to the remote endpoint
//! (§4.7 steps 2-4).

use std::io::Write as _;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// The remote endpoint's optional acknowledgement body.
#[derive(Debug, Default, Deserialize)]
pub struct SyncAck {
    #[serde(default)]
    pub duplicates: u64,
}

/// Gzips `payload` if it exceeds `threshold_bytes`. Returns the body to
/// send and whether it was compressed.
pub fn maybe_compress(payload: &[u8], threshold_bytes: usize) -> Result<(Vec<u8>, bool)> {
    if payload.len() <= threshold_bytes {
        return Ok((payload.to_vec(), false));
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    Ok((encoder.finish()?, true))
}

/// POSTs `body` to `config.endpoint_url`, retrying up to
/// `config.max_retries` times with exponential backoff starting at
/// `config.retry_backoff_ms` (§4.7 step 4).
pub async fn post_with_retry(client: &Client, config: &SyncConfig, body: &[u8], gzip: bool) -> Result<SyncAck> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let mut request = client
            .post(&config.endpoint_url)
            .bearer_auth(&config.bearer_token)
            .header("Content-Type", "application/json")
            .body(body.to_vec());
        if gzip {
            request = request.header("Content-Encoding", "gzip");
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                let ack = resp.json::<SyncAck>().await.unwrap_or_default();
                return Ok(ack);
            }
            Ok(resp) => {
                warn!(status = %resp.status(), attempt, "sync endpoint rejected batch");
            }
            Err(err) => {
                warn!(%err, attempt, "sync transport error");
            }
        }

        if attempt > config.max_retries {
            return Err(SyncError::Exhausted);
        }
        let backoff_ms = config.retry_backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_not_compressed() {
        let (body, gzip) = maybe_compress(b"tiny", 1024).unwrap();
        assert!(!gzip);
        assert_eq!(body, b"tiny");
    }

    #[test]
    fn large_payload_is_gzipped() {
        let payload = vec![b'x'; 2048];
        let (body, gzip) = maybe_compress(&payload, 1024).unwrap();
        assert!(gzip);
        assert!(body.len() < payload.len());
    }
}
