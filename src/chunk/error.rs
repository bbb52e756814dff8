use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Invalid chunk index {index}: file has {total_chunks} chunks")]
    InvalidChunkIndex { index: u32, total_chunks: u32 },
}

pub type Result<T> = std::result::Result<T, ChunkError>;
