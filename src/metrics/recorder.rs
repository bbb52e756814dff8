//! Metrics recorder for chunked uploads

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!("shareflow_chunks_sent_total", "Chunks accepted by the server");
    describe_counter!(
        "shareflow_chunk_retries_total",
        "Chunk upload attempts that were retried"
    );
    describe_counter!(
        "shareflow_chunks_failed_total",
        "Chunks that exhausted their retry budget"
    );
    describe_counter!("shareflow_bytes_sent_total", "Chunk payload bytes accepted");

    describe_counter!(
        "shareflow_files_uploaded_total",
        "Files whose every chunk was accepted"
    );
    describe_counter!("shareflow_files_failed_total", "Files that failed to upload");
    describe_counter!(
        "shareflow_file_bytes_uploaded_total",
        "Bytes of files whose every chunk was accepted"
    );

    describe_gauge!("shareflow_active_uploads", "Files currently being uploaded");

    describe_histogram!(
        "shareflow_chunk_upload_duration_seconds",
        "Time to upload a single chunk, retries included"
    );
    describe_histogram!(
        "shareflow_file_upload_duration_seconds",
        "Time to upload a whole file"
    );
}

// ============== Chunk Operations ==============

// Unlabelled. File ids go in tracing fields.

pub fn record_chunk_sent(chunk_size: usize) {
    counter!("shareflow_chunks_sent_total").increment(1);
    counter!("shareflow_bytes_sent_total").increment(chunk_size as u64);
}

pub fn record_chunk_retry() {
    counter!("shareflow_chunk_retries_total").increment(1);
}

pub fn record_chunk_failed() {
    counter!("shareflow_chunks_failed_total").increment(1);
}

pub fn record_chunk_duration(duration: Duration) {
    histogram!("shareflow_chunk_upload_duration_seconds").record(duration.as_secs_f64());
}

// ============== File Operations ==============

pub fn record_file_started() {
    gauge!("shareflow_active_uploads").increment(1.0);
}

pub fn record_file_uploaded(duration: Duration, bytes: u64) {
    counter!("shareflow_files_uploaded_total").increment(1);
    counter!("shareflow_file_bytes_uploaded_total").increment(bytes);
    gauge!("shareflow_active_uploads").decrement(1.0);
    histogram!("shareflow_file_upload_duration_seconds").record(duration.as_secs_f64());
}

/// `reason` must come from a fixed set; it becomes a label.
pub fn record_file_failed(reason: &'static str) {
    counter!("shareflow_files_failed_total", "reason" => reason).increment(1);
    gauge!("shareflow_active_uploads").decrement(1.0);
}

/// Times one file upload from start to its terminal state.
pub struct FileUploadMetrics {
    start_time: Instant,
    file_size: u64,
}

impl FileUploadMetrics {
    pub fn start(file_size: u64) -> Self {
        record_file_started();
        Self {
            start_time: Instant::now(),
            file_size,
        }
    }

    pub fn complete(self) {
        record_file_uploaded(self.start_time.elapsed(), self.file_size);
    }

    pub fn fail(self, reason: &'static str) {
        record_file_failed(reason);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

pub struct ChunkTimer {
    start_time: Instant,
}

impl ChunkTimer {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn stop(self) {
        record_chunk_duration(self.start_time.elapsed());
    }
}
