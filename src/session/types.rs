use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk::{FileMeta, RawFile};

/// A staged file: metadata plus the underlying byte source.
#[derive(Debug, Clone)]
pub struct FileItem {
    pub meta: FileMeta,
    pub file: Arc<RawFile>,
    /// Staging order, used to upload in the order files were added.
    pub sequence: u64,
}

impl FileItem {
    pub fn size(&self) -> u64 {
        self.file.size()
    }
}

/// Staged files keyed by file id. Every key equals its item's `meta.file_id`.
///
/// Updates return a new set, leaving snapshots held by readers untouched.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    items: HashMap<String, FileItem>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, file_id: &str) -> Option<&FileItem> {
        self.items.get(file_id)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.items.contains_key(file_id)
    }

    /// Items in staging order.
    pub fn items(&self) -> Vec<&FileItem> {
        let mut items: Vec<&FileItem> = self.items.values().collect();
        items.sort_by_key(|item| item.sequence);
        items
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.values().map(FileItem::size).sum()
    }

    /// Number of entries still waiting for a hash.
    pub fn pending_hashes(&self) -> usize {
        self.items.values().filter(|i| !i.meta.has_hash()).count()
    }

    /// Every staged entry carries a hash.
    pub fn all_hashed(&self) -> bool {
        self.pending_hashes() == 0
    }

    pub fn with_item(&self, item: FileItem) -> Self {
        let mut items = self.items.clone();
        items.insert(item.meta.file_id.clone(), item);
        Self { items }
    }

    pub fn without(&self, file_id: &str) -> Self {
        let mut items = self.items.clone();
        items.remove(file_id);
        Self { items }
    }

    pub fn without_all<'a>(&self, file_ids: impl IntoIterator<Item = &'a String>) -> Self {
        let mut items = self.items.clone();
        for id in file_ids {
            items.remove(id);
        }
        Self { items }
    }

    /// `None` when the entry no longer exists.
    pub fn with_hash(&self, file_id: &str, md5_hash: &str) -> Option<Self> {
        let item = self.items.get(file_id)?;
        let updated = FileItem {
            meta: item.meta.with_hash(md5_hash),
            ..item.clone()
        };
        Some(self.with_item(updated))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every byte of every staged file was confirmed.
    Complete,
    /// At least one file failed; aggregate progress stays below 100.
    Incomplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub outcome: BatchOutcome,
    pub uploaded: Vec<String>,
    /// `(file_id, error)` per failed file.
    pub failed: Vec<(String, String)>,
    pub bytes_sent: u64,
    pub bytes_total: u64,
    pub progress_percent: f64,
}

impl UploadSummary {
    pub fn is_complete(&self) -> bool {
        self.outcome == BatchOutcome::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, size: usize, sequence: u64) -> FileItem {
        FileItem {
            meta: FileMeta::new(name),
            file: Arc::new(RawFile::from_bytes(name, vec![0u8; size])),
            sequence,
        }
    }

    #[test]
    fn test_copy_on_write() {
        let a = item("a.txt", 3, 0);
        let id = a.meta.file_id.clone();
        let original = FileSet::new().with_item(a);
        let updated = original.with_hash(&id, "abc").unwrap();

        assert!(!original.get(&id).unwrap().meta.has_hash());
        assert_eq!(updated.get(&id).unwrap().meta.md5_hash, "abc");
        assert!(Arc::ptr_eq(
            &original.get(&id).unwrap().file,
            &updated.get(&id).unwrap().file
        ));
    }

    #[test]
    fn test_keys_match_ids() {
        let set = FileSet::new()
            .with_item(item("a.txt", 1, 0))
            .with_item(item("b.txt", 2, 1));
        for item in set.items() {
            assert!(set.contains(&item.meta.file_id));
        }
        assert_eq!(set.total_bytes(), 3);
    }

    #[test]
    fn test_hash_on_missing_entry() {
        let set = FileSet::new();
        assert!(set.with_hash("nope", "abc").is_none());
    }

    #[test]
    fn test_items_in_staging_order() {
        let set = FileSet::new()
            .with_item(item("c.txt", 1, 2))
            .with_item(item("a.txt", 1, 0))
            .with_item(item("b.txt", 1, 1));
        let names: Vec<String> = set.items().iter().map(|i| i.meta.display_name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_readiness() {
        let a = item("a.txt", 1, 0);
        let id = a.meta.file_id.clone();
        let set = FileSet::new().with_item(a);
        assert_eq!(set.pending_hashes(), 1);
        assert!(!set.all_hashed());
        assert!(set.with_hash(&id, "abc").unwrap().all_hashed());
    }
}
