use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ClientConfig;

/// Header selecting the shared-folder variant of the upload endpoint.
pub const FOLDER_ID_HEADER: &str = "Folder-Id";

/// Result of uploading one chunk or one file. Failure is a value, not an
/// error, so callers can weigh one failed chunk against its siblings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Zero means retry immediately.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_chunk_retries,
            backoff: config.retry_backoff(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(5)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub total_bytes_sent: u64,
    pub chunks_sent: u64,
    pub chunks_failed: u64,
    pub retransmissions: u64,
}
