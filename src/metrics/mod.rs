//! Upload metrics
//!
//! Counters and histograms for chunk and file outcomes, recorded through the
//! `metrics` facade. Nothing is exported unless the embedding application
//! installs a recorder.

pub mod recorder;

pub use recorder::{
    init_metrics, record_chunk_failed, record_chunk_retry, record_chunk_sent,
    record_file_failed, record_file_uploaded, ChunkTimer, FileUploadMetrics,
};
