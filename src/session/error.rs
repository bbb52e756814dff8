use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileSetError {
    #[error("No files staged for upload")]
    Empty,

    #[error("Files not ready: {pending} still waiting for a content hash")]
    NotReady { pending: usize },

    #[error("An upload is already in progress")]
    AlreadyUploading,

    #[error("Chunk error: {0}")]
    ChunkError(#[from] crate::chunk::ChunkError),

    #[error("Coordinator error: {0}")]
    CoordinatorError(#[from] crate::coordinator::CoordinatorError),
}

pub type FileSetResult<T> = Result<T, FileSetError>;
