use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Max retries exceeded ({attempts} attempts): {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::RequestFailed(err.to_string())
    }
}

impl NetworkError {
    /// Whether another attempt with the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NetworkError::RefreshFailed(_))
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
