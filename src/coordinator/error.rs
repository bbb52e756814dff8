use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("No file provided")]
    MissingFile,

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Chunk upload failed (chunk {chunk_index}): {reason}")]
    ChunkUploadFailed { chunk_index: u32, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chunk error: {0}")]
    ChunkError(#[from] crate::chunk::ChunkError),

    #[error("Network error: {0}")]
    NetworkError(#[from] crate::network::NetworkError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
