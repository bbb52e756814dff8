pub mod error;
pub mod http_transport;
pub mod transport;
pub mod types;

pub use error::{NetworkError, NetworkResult};
pub use http_transport::HttpChunkTransport;
pub use transport::{ChunkTransport, ChunkUploader};
pub use types::{NetworkStats, RetryPolicy, UploadOutcome, FOLDER_ID_HEADER};
