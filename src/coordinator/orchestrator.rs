use futures::future::join_all;
use std::sync::Arc;

use crate::chunk::{ChunkBuilder, FileMeta, RawFile};
use crate::config::ClientConfig;
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::state_machine::FileUploadStateMachine;
use crate::coordinator::types::{FileUploadState, UploadEvent};
use crate::metrics::FileUploadMetrics;
use crate::network::{ChunkTransport, ChunkUploader, RetryPolicy, UploadOutcome};

/// Drives the chunked transfer of one file.
///
/// Chunks go out in windows of at most `concurrent_chunks`. A window must
/// fully settle before the next one is built, so at most that many chunk
/// buffers are resident and at most that many requests are outstanding.
#[derive(Clone)]
pub struct UploadOrchestrator {
    builder: ChunkBuilder,
    uploader: ChunkUploader,
    concurrent_chunks: usize,
}

impl UploadOrchestrator {
    pub fn new(
        builder: ChunkBuilder,
        uploader: ChunkUploader,
        concurrent_chunks: usize,
    ) -> CoordinatorResult<Self> {
        if concurrent_chunks == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "concurrent chunk count must be positive".into(),
            ));
        }
        Ok(Self {
            builder,
            uploader,
            concurrent_chunks,
        })
    }

    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn ChunkTransport>,
    ) -> CoordinatorResult<Self> {
        let builder = ChunkBuilder::new(config.chunk_size())?;
        let uploader = ChunkUploader::new(transport, RetryPolicy::from_config(config));
        Self::new(builder, uploader, config.max_concurrent_chunks)
    }

    pub fn builder(&self) -> &ChunkBuilder {
        &self.builder
    }

    pub fn uploader(&self) -> &ChunkUploader {
        &self.uploader
    }

    /// Upload one file and report chunk-granularity progress (0 to 100).
    ///
    /// Progress is non-decreasing and reaches 100 only when every chunk was
    /// accepted. Any failure comes back as a failed outcome, never as a panic
    /// or an `Err`.
    pub async fn upload_file(
        &self,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        meta: &FileMeta,
        file: Option<&RawFile>,
        folder_id: Option<&str>,
    ) -> UploadOutcome {
        let Some(file) = file else {
            tracing::error!(file_id = %meta.file_id, "upload requested without a file");
            return UploadOutcome::failure(CoordinatorError::MissingFile.to_string());
        };

        let metrics = FileUploadMetrics::start(file.size());
        match self.run_windows(on_progress, meta, file, folder_id).await {
            Ok(()) => {
                tracing::info!(
                    file_id = %meta.file_id,
                    file_name = %meta.display_name(),
                    bytes = file.size(),
                    elapsed_ms = metrics.elapsed().as_millis() as u64,
                    "file uploaded"
                );
                metrics.complete();
                UploadOutcome::success()
            }
            Err(e) => {
                tracing::error!(
                    file_id = %meta.file_id,
                    file_name = %meta.display_name(),
                    "file upload failed: {}",
                    e
                );
                metrics.fail("chunk_failure");
                UploadOutcome::failure(e.to_string())
            }
        }
    }

    async fn run_windows(
        &self,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        meta: &FileMeta,
        file: &RawFile,
        folder_id: Option<&str>,
    ) -> CoordinatorResult<()> {
        let total_chunks = self.builder.total_chunks(file.size())?;
        let state = FileUploadStateMachine::new();
        state.transition(UploadEvent::Start { total_chunks })?;

        if total_chunks == 0 {
            on_progress(100.0);
        }

        let window_size = self.concurrent_chunks as u32;
        let mut window: u32 = 0;
        let mut next_index: u32 = 0;

        while next_index < total_chunks {
            let window_end = next_index.saturating_add(window_size).min(total_chunks);
            state.transition(UploadEvent::WindowStarted { window })?;

            tracing::debug!(
                file_id = %meta.file_id,
                window,
                first_chunk = next_index,
                last_chunk = window_end - 1,
                "dispatching window"
            );

            let in_flight = (next_index..window_end)
                .map(|chunk_index| self.send_chunk(&state, on_progress, meta, file, chunk_index, folder_id));
            let results = join_all(in_flight).await;

            let failure = results
                .into_iter()
                .zip(next_index..window_end)
                .find_map(|(result, chunk_index)| match result {
                    Ok(outcome) if outcome.is_success() => None,
                    Ok(outcome) => Some((
                        chunk_index,
                        outcome.error.unwrap_or_else(|| "unknown error".into()),
                    )),
                    Err(e) => Some((chunk_index, e.to_string())),
                });

            if let Some((chunk_index, reason)) = failure {
                let err = CoordinatorError::ChunkUploadFailed {
                    chunk_index,
                    reason,
                };
                state.transition(UploadEvent::Fail {
                    error: err.to_string(),
                })?;
                return Err(err);
            }

            next_index = window_end;
            window += 1;
        }

        state.transition(UploadEvent::TransferComplete)?;
        Ok(())
    }

    async fn send_chunk(
        &self,
        state: &FileUploadStateMachine,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        meta: &FileMeta,
        file: &RawFile,
        chunk_index: u32,
        folder_id: Option<&str>,
    ) -> CoordinatorResult<UploadOutcome> {
        let packet = self.builder.build_chunk(file, meta, chunk_index).await?;

        let on_complete = || match state.transition(UploadEvent::ChunkCompleted { chunk_index }) {
            Ok(new_state @ FileUploadState::Chunking { .. }) => {
                on_progress(new_state.progress_percent())
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(file_id = %meta.file_id, "progress not recorded: {}", e),
        };

        Ok(self
            .uploader
            .upload_chunk(&packet, folder_id, &on_complete)
            .await)
    }
}
