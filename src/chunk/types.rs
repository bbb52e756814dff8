use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::{ChunkError, Result};

/// Identity and descriptive attributes of a staged file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_id: String,
    pub file_name: String,
    /// Includes the leading dot, or is empty.
    pub file_extension: String,
    /// Empty until the content hash has been computed.
    pub md5_hash: String,
}

impl FileMeta {
    /// Fresh metadata for a display name, with a new identifier and no hash.
    pub fn new(display_name: &str) -> Self {
        let (file_name, file_extension) = split_file_name(display_name);
        Self {
            file_id: uuid::Uuid::new_v4().to_string(),
            file_name,
            file_extension,
            md5_hash: String::new(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{}{}", self.file_name, self.file_extension)
    }

    pub fn has_hash(&self) -> bool {
        !self.md5_hash.is_empty()
    }

    pub fn with_hash(&self, md5_hash: impl Into<String>) -> Self {
        Self {
            md5_hash: md5_hash.into(),
            ..self.clone()
        }
    }
}

/// Split at the last `.` into base name and extension (dot kept).
pub fn split_file_name(name: &str) -> (String, String) {
    match name.rfind('.') {
        Some(idx) => (name[..idx].to_string(), name[idx..].to_string()),
        None => (name.to_string(), String::new()),
    }
}

#[derive(Debug)]
enum FileSource {
    Disk(PathBuf),
    Memory(Bytes),
}

/// A named byte source staged for upload.
#[derive(Debug)]
pub struct RawFile {
    name: String,
    size: u64,
    source: FileSource,
}

impl RawFile {
    /// Stage a file from disk. Size is captured at open time.
    pub async fn open(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ChunkError::InvalidFile(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ChunkError::InvalidFile(path.display().to_string()))?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read bytes `[start, end)`.
    pub async fn read_range(&self, start: u64, end: u64) -> std::io::Result<Bytes> {
        let end = end.min(self.size);
        if start >= end {
            return Ok(Bytes::new());
        }

        match &self.source {
            FileSource::Memory(data) => Ok(data.slice(start as usize..end as usize)),
            FileSource::Disk(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(start)).await?;
                let mut buf = vec![0u8; (end - start) as usize];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }

    pub async fn read_all(&self) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Memory(data) => Ok(data.clone()),
            FileSource::Disk(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}

/// One byte-range slice of a file, ready to be sent.
#[derive(Debug, Clone)]
pub struct ChunkPacket {
    pub meta: FileMeta,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub data: Bytes,
}

impl ChunkPacket {
    /// Text fields of the multipart form, in wire order. The binary `chunk`
    /// part follows them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("fileId", self.meta.file_id.clone()),
            ("fileName", self.meta.file_name.clone()),
            ("fileExtension", self.meta.file_extension.clone()),
            ("md5Hash", self.meta.md5_hash.clone()),
            ("chunkIndex", self.chunk_index.to_string()),
            ("totalChunks", self.total_chunks.to_string()),
        ]
    }
}
