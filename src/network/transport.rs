use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::chunk::ChunkPacket;
use crate::metrics::{self, ChunkTimer};
use crate::network::error::{NetworkError, NetworkResult};
use crate::network::types::{NetworkStats, RetryPolicy, UploadOutcome};

/// One network attempt for one chunk.
///
/// Implementations perform a single request and report whether the server
/// accepted it. Retrying is the caller's business.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn send_chunk(&self, packet: &ChunkPacket, folder_id: Option<&str>) -> NetworkResult<()>;
}

/// Sends chunks through a transport with bounded, immediate-by-default retry.
#[derive(Clone)]
pub struct ChunkUploader {
    transport: Arc<dyn ChunkTransport>,
    policy: RetryPolicy,
    stats: Arc<RwLock<NetworkStats>>,
}

impl ChunkUploader {
    pub fn new(transport: Arc<dyn ChunkTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            stats: Arc::new(RwLock::new(NetworkStats::default())),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats.read().clone()
    }

    /// Upload one chunk, retrying up to `max_retries` more times.
    ///
    /// `on_complete` fires exactly once, and only on success. Exhausting the
    /// budget yields a failed outcome carrying the last error; nothing is
    /// propagated as an `Err`.
    pub async fn upload_chunk(
        &self,
        packet: &ChunkPacket,
        folder_id: Option<&str>,
        on_complete: &(dyn Fn() + Send + Sync),
    ) -> UploadOutcome {
        let file_id = packet.meta.file_id.as_str();
        let timer = ChunkTimer::start();
        let mut attempt: u32 = 0;

        loop {
            match self.transport.send_chunk(packet, folder_id).await {
                Ok(()) => {
                    {
                        let mut stats = self.stats.write();
                        stats.chunks_sent += 1;
                        stats.total_bytes_sent += packet.data.len() as u64;
                    }
                    metrics::record_chunk_sent(packet.data.len());
                    timer.stop();

                    tracing::debug!(
                        file_id,
                        chunk_index = packet.chunk_index,
                        attempt,
                        "chunk accepted"
                    );
                    on_complete();
                    return UploadOutcome::success();
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    tracing::warn!(
                        file_id,
                        chunk_index = packet.chunk_index,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts(),
                        "chunk upload failed, retrying: {}",
                        e
                    );
                    self.stats.write().retransmissions += 1;
                    metrics::record_chunk_retry();

                    if !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    self.stats.write().chunks_failed += 1;
                    metrics::record_chunk_failed();
                    timer.stop();

                    tracing::warn!(
                        file_id,
                        chunk_index = packet.chunk_index,
                        attempts = attempt + 1,
                        "chunk upload gave up: {}",
                        e
                    );
                    if !e.is_retryable() {
                        return UploadOutcome::failure(e.to_string());
                    }
                    let err = NetworkError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    };
                    return UploadOutcome::failure(err.to_string());
                }
            }
        }
    }
}
