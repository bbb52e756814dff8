use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("File size {size} exceeds maximum {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Error reading file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Hash computation cancelled")]
    Cancelled,

    #[error("Hash task failed: {0}")]
    TaskFailed(String),
}

pub type HashResult<T> = Result<T, HashError>;
