use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chunk::RawFile;
use crate::integrity::error::{HashError, HashResult};

/// Lowercase hex MD5 digest.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Computes whole-file MD5 digests, independent of any transfer.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    max_file_size: u64,
}

/// Handle to a spawned hash computation.
pub struct HashTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl HashTask {
    /// Abort the read. The completion callback will not run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

impl ContentHasher {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Read the whole file and hash it, unless cancelled first.
    pub async fn hash_file(&self, file: &RawFile, cancel: &CancellationToken) -> HashResult<String> {
        if file.size() > self.max_file_size {
            return Err(HashError::TooLarge {
                size: file.size(),
                max: self.max_file_size,
            });
        }

        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HashError::Cancelled),
            data = file.read_all() => data?,
        };

        let digest = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HashError::Cancelled),
            digest = tokio::task::spawn_blocking(move || md5_hex(&data)) => {
                digest.map_err(|e| HashError::TaskFailed(e.to_string()))?
            }
        };

        if cancel.is_cancelled() {
            return Err(HashError::Cancelled);
        }
        Ok(digest)
    }

    /// Hash `file` in the background and report back keyed by `file_id`.
    ///
    /// `on_done` receives either the digest or the error. It never runs once
    /// the task has been cancelled.
    pub fn spawn<F>(&self, file_id: String, file: Arc<RawFile>, on_done: F) -> HashTask
    where
        F: FnOnce(String, HashResult<String>) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let hasher = *self;

        let handle = tokio::spawn(async move {
            let result = hasher.hash_file(&file, &token).await;
            match result {
                Err(HashError::Cancelled) => {
                    tracing::debug!(file_id = %file_id, "hash computation aborted");
                }
                _ if token.is_cancelled() => {
                    tracing::debug!(file_id = %file_id, "hash result discarded after cancel");
                }
                result => on_done(file_id, result),
            }
        });

        HashTask { cancel, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_md5_known_vectors() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_hex(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[tokio::test]
    async fn test_hash_disk_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fox.txt");
        tokio::fs::write(&path, b"The quick brown fox jumps over the lazy dog")
            .await
            .unwrap();

        let file = RawFile::open(&path).await.unwrap();
        let hasher = ContentHasher::new(1024);
        let digest = hasher
            .hash_file(&file, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(digest, "9e107d9d372bb6826bd81d3542a419d6");
    }

    #[tokio::test]
    async fn test_oversize_file_rejected() {
        let file = RawFile::from_bytes("big.bin", vec![0u8; 11]);
        let hasher = ContentHasher::new(10);

        let result = hasher.hash_file(&file, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(HashError::TooLarge { size: 11, max: 10 })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_read() {
        let file = RawFile::from_bytes("a.txt", b"abc".to_vec());
        let hasher = ContentHasher::new(1024);
        let token = CancellationToken::new();
        token.cancel();

        let result = hasher.hash_file(&file, &token).await;
        assert!(matches!(result, Err(HashError::Cancelled)));
    }

    #[tokio::test]
    async fn test_spawn_reports_keyed_result() {
        let hasher = ContentHasher::new(1024);
        let file = Arc::new(RawFile::from_bytes("a.txt", b"abc".to_vec()));
        let seen = Arc::new(Mutex::new(None));

        let sink = seen.clone();
        let task = hasher.spawn("file-1".into(), file, move |id, result| {
            *sink.lock() = Some((id, result.ok()));
        });
        task.join().await;

        assert_eq!(
            seen.lock().clone(),
            Some((
                "file-1".to_string(),
                Some("900150983cd24fb0d6963f7d28e17f72".to_string())
            ))
        );
    }

    #[tokio::test]
    async fn test_spawn_reports_errors() {
        let hasher = ContentHasher::new(1);
        let file = Arc::new(RawFile::from_bytes("a.txt", b"abc".to_vec()));
        let seen = Arc::new(Mutex::new(None));

        let sink = seen.clone();
        hasher
            .spawn("file-2".into(), file, move |id, result| {
                *sink.lock() = Some((id, result.is_err()));
            })
            .join()
            .await;

        assert_eq!(seen.lock().clone(), Some(("file-2".to_string(), true)));
    }

    #[tokio::test]
    async fn test_cancelled_task_never_calls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        tokio::fs::write(&path, vec![1u8; 4 * 1024 * 1024]).await.unwrap();

        let hasher = ContentHasher::new(u64::MAX);
        let file = Arc::new(RawFile::open(&path).await.unwrap());
        let called = Arc::new(Mutex::new(false));

        let flag = called.clone();
        let task = hasher.spawn("file-3".into(), file, move |_, _| {
            *flag.lock() = true;
        });
        task.cancel();
        task.join().await;

        assert!(!*called.lock());
    }
}
