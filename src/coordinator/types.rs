use serde::{Deserialize, Serialize};

/// Lifecycle of one file's chunked transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FileUploadState {
    Pending,
    Chunking {
        window: u32,
        completed_chunks: u32,
        total_chunks: u32,
    },
    Completed,
    Failed { error: String },
}

impl FileUploadState {
    pub fn is_active(&self) -> bool {
        matches!(self, FileUploadState::Chunking { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileUploadState::Completed | FileUploadState::Failed { .. }
        )
    }

    /// Chunk-granularity completion, 0 to 100.
    pub fn progress_percent(&self) -> f64 {
        match self {
            FileUploadState::Pending => 0.0,
            FileUploadState::Chunking {
                completed_chunks,
                total_chunks,
                ..
            } => {
                if *total_chunks == 0 {
                    100.0
                } else {
                    *completed_chunks as f64 / *total_chunks as f64 * 100.0
                }
            }
            FileUploadState::Completed => 100.0,
            FileUploadState::Failed { .. } => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Start { total_chunks: u32 },
    WindowStarted { window: u32 },
    ChunkCompleted { chunk_index: u32 },
    TransferComplete,
    Fail { error: String },
}
