use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::chunk::{FileMeta, RawFile};
use crate::config::ClientConfig;
use crate::coordinator::UploadOrchestrator;
use crate::integrity::{ContentHasher, HashResult, HashTask};
use crate::network::ChunkTransport;
use crate::session::error::{FileSetError, FileSetResult};
use crate::session::notify::{Notification, UploadObserver};
use crate::session::types::{BatchOutcome, FileItem, FileSet, UploadSummary};

/// Source of truth for what is staged and how the batch is progressing.
///
/// Cheap to clone; clones share state. Staging a file starts its hash
/// computation in the background, so `add_file` must run inside a Tokio
/// runtime.
#[derive(Clone)]
pub struct FileSetManager {
    inner: Arc<Inner>,
}

struct Inner {
    files: RwLock<Arc<FileSet>>,
    hash_tasks: Mutex<HashMap<String, HashTask>>,
    hashes_settled: Notify,
    hasher: ContentHasher,
    orchestrator: UploadOrchestrator,
    observer: Arc<dyn UploadObserver>,
    uploading: AtomicBool,
    progress: RwLock<f64>,
    next_sequence: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.hash_tasks.get_mut().values() {
            task.cancel();
        }
    }
}

/// Clears the uploading flag however `upload_files` exits.
struct UploadingFlag<'a>(&'a AtomicBool);

impl Drop for UploadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FileSetManager {
    pub fn new(
        hasher: ContentHasher,
        orchestrator: UploadOrchestrator,
        observer: Arc<dyn UploadObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                files: RwLock::new(Arc::new(FileSet::new())),
                hash_tasks: Mutex::new(HashMap::new()),
                hashes_settled: Notify::new(),
                hasher,
                orchestrator,
                observer,
                uploading: AtomicBool::new(false),
                progress: RwLock::new(0.0),
                next_sequence: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn ChunkTransport>,
        observer: Arc<dyn UploadObserver>,
    ) -> FileSetResult<Self> {
        let orchestrator = UploadOrchestrator::from_config(config, transport)?;
        let hasher = ContentHasher::new(config.max_file_size);
        Ok(Self::new(hasher, orchestrator, observer))
    }

    /// Consistent view of the staged files at this instant.
    pub fn snapshot(&self) -> Arc<FileSet> {
        self.inner.files.read().clone()
    }

    pub fn file_count(&self) -> usize {
        self.inner.files.read().len()
    }

    /// True when something is staged and every staged file has its hash.
    pub fn is_ready(&self) -> bool {
        let files = self.inner.files.read();
        !files.is_empty() && files.all_hashed()
    }

    pub fn is_uploading(&self) -> bool {
        self.inner.uploading.load(Ordering::SeqCst)
    }

    /// Aggregate batch progress, 0 to 100, byte-weighted.
    pub fn progress(&self) -> f64 {
        *self.inner.progress.read()
    }

    /// Stage a file and start hashing it. Returns the new file id.
    pub fn add_file(&self, file: RawFile) -> String {
        let meta = FileMeta::new(file.name());
        let file_id = meta.file_id.clone();
        let file = Arc::new(file);

        let item = FileItem {
            meta,
            file: file.clone(),
            sequence: self.inner.next_sequence.fetch_add(1, Ordering::SeqCst),
        };
        tracing::debug!(
            file_id = %file_id,
            file_name = %item.meta.display_name(),
            size = item.size(),
            "file staged"
        );
        self.update(|set| Some(set.with_item(item)));

        // Held across spawn so the completion callback cannot race the insert.
        let mut tasks = self.inner.hash_tasks.lock();
        let weak = Arc::downgrade(&self.inner);
        let task = self
            .inner
            .hasher
            .spawn(file_id.clone(), file, move |file_id, result| {
                if let Some(inner) = weak.upgrade() {
                    FileSetManager { inner }.finish_hash(&file_id, result);
                }
            });
        tasks.insert(file_id.clone(), task);

        file_id
    }

    pub async fn add_path(&self, path: &Path) -> FileSetResult<String> {
        let file = RawFile::open(path).await?;
        Ok(self.add_file(file))
    }

    /// Remove a staged file, aborting its hash computation. No-op when absent.
    pub fn delete_file(&self, file_id: &str) -> bool {
        if let Some(task) = self.inner.hash_tasks.lock().remove(file_id) {
            task.cancel();
        }
        let removed = self.update(|set| set.contains(file_id).then(|| set.without(file_id)));
        self.inner.hashes_settled.notify_waiters();

        if removed {
            tracing::debug!(file_id, "file removed");
        }
        removed
    }

    /// Record a computed hash. No-op if the file was removed in the meantime.
    pub fn add_md5_hash(&self, file_id: &str, md5_hash: &str) -> bool {
        let updated = self.update(|set| set.with_hash(file_id, md5_hash));
        if !updated {
            tracing::debug!(file_id, "hash arrived for a removed file, ignored");
        }
        updated
    }

    /// Remove everything, aborting outstanding hash computations.
    pub fn clear(&self) {
        for (_, task) in self.inner.hash_tasks.lock().drain() {
            task.cancel();
        }
        self.update(|_| Some(FileSet::new()));
        self.inner.hashes_settled.notify_waiters();
    }

    /// Wait until no hash computation is outstanding.
    pub async fn wait_for_hashes(&self) {
        loop {
            let settled = self.inner.hashes_settled.notified();
            if self.inner.hash_tasks.lock().is_empty() {
                return;
            }
            settled.await;
        }
    }

    /// Upload every staged file, one file at a time.
    ///
    /// A failed file raises an error notification and the batch moves on.
    /// The batch ends with a success notification only if every byte was
    /// confirmed, otherwise with an "incomplete" one; fully uploaded batches
    /// are unstaged.
    pub async fn upload_files(&self, folder_id: Option<&str>) -> FileSetResult<UploadSummary> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Err(FileSetError::Empty);
        }
        let pending = snapshot.pending_hashes();
        if pending > 0 {
            return Err(FileSetError::NotReady { pending });
        }
        if self
            .inner
            .uploading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FileSetError::AlreadyUploading);
        }
        let _uploading = UploadingFlag(&self.inner.uploading);

        let items = snapshot.items();
        let bytes_total = snapshot.total_bytes();
        let mut bytes_sent: u64 = 0;
        let mut uploaded: Vec<String> = Vec::new();
        let mut failed: Vec<(String, String)> = Vec::new();

        tracing::info!(
            files = items.len(),
            bytes_total,
            folder_id = folder_id.unwrap_or("-"),
            "starting batch upload"
        );
        self.set_progress(0.0);

        for item in &items {
            let file_id = item.meta.file_id.as_str();
            let observer = &self.inner.observer;
            let on_progress = |percent: f64| observer.on_file_progress(file_id, percent);

            let outcome = self
                .inner
                .orchestrator
                .upload_file(&on_progress, &item.meta, Some(item.file.as_ref()), folder_id)
                .await;

            if outcome.is_success() {
                bytes_sent += item.size();
                uploaded.push(file_id.to_string());
            } else {
                let error = outcome.error.unwrap_or_else(|| "unknown error".into());
                failed.push((file_id.to_string(), error));
                self.inner.observer.on_notification(
                    Notification::error(
                        "Upload Error",
                        format!("File `{}` failed to upload", item.meta.display_name()),
                    )
                    .for_file(file_id),
                );
            }

            self.set_progress(aggregate_percent(
                bytes_sent,
                bytes_total,
                uploaded.len(),
                items.len(),
            ));
        }

        let outcome = if failed.is_empty() && bytes_sent == bytes_total {
            BatchOutcome::Complete
        } else {
            BatchOutcome::Incomplete
        };

        match outcome {
            BatchOutcome::Complete => {
                self.update(|set| Some(set.without_all(&uploaded)));
                self.inner.observer.on_notification(Notification::success(
                    "Upload Success",
                    "All files uploaded successfully",
                ));
            }
            BatchOutcome::Incomplete => {
                tracing::warn!(failed = failed.len(), "batch finished incomplete");
                self.inner.observer.on_notification(Notification::info(
                    "Upload Error",
                    "Files finished uploading. Some files failed to upload",
                ));
            }
        }

        Ok(UploadSummary {
            outcome,
            uploaded,
            failed,
            bytes_sent,
            bytes_total,
            progress_percent: self.progress(),
        })
    }

    fn finish_hash(&self, file_id: &str, result: HashResult<String>) {
        self.inner.hash_tasks.lock().remove(file_id);

        match result {
            Ok(md5_hash) => {
                self.add_md5_hash(file_id, &md5_hash);
            }
            Err(e) => {
                if let Some(item) = self.snapshot().get(file_id) {
                    let name = item.meta.display_name();
                    tracing::error!(file_id, file_name = %name, "hash computation failed: {}", e);
                    self.inner.observer.on_notification(
                        Notification::error(
                            "File Error",
                            format!("File `{name}` cannot be uploaded: {e}"),
                        )
                        .for_file(file_id),
                    );
                }
            }
        }

        self.inner.hashes_settled.notify_waiters();
    }

    /// Swap in a new set if `f` produces one.
    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&FileSet) -> Option<FileSet>,
    {
        let mut files = self.inner.files.write();
        match f(&files) {
            Some(next) => {
                *files = Arc::new(next);
                true
            }
            None => false,
        }
    }

    fn set_progress(&self, percent: f64) {
        *self.inner.progress.write() = percent;
        self.inner.observer.on_batch_progress(percent);
    }
}

fn aggregate_percent(bytes_sent: u64, bytes_total: u64, files_done: usize, files_total: usize) -> f64 {
    if bytes_total == 0 {
        files_done as f64 / files_total.max(1) as f64 * 100.0
    } else {
        bytes_sent as f64 / bytes_total as f64 * 100.0
    }
}
