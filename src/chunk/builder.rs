use std::ops::Range;

use super::error::{ChunkError, Result};
use super::types::{ChunkPacket, FileMeta, RawFile};

/// Slices files into fixed-size chunks.
///
/// Stateless apart from the chunk size, so one builder can serve any
/// number of concurrent `build_chunk` calls on the same file.
#[derive(Debug, Clone, Copy)]
pub struct ChunkBuilder {
    chunk_size: u64,
}

impl ChunkBuilder {
    pub fn new(chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidChunkSize(
                "chunk size must be positive".into(),
            ));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// `ceil(file_size / chunk_size)`, which must fit the `u32` chunk index.
    pub fn total_chunks(&self, file_size: u64) -> Result<u32> {
        u32::try_from(file_size.div_ceil(self.chunk_size)).map_err(|_| {
            ChunkError::InvalidFile(format!(
                "{} bytes needs more than {} chunks of {} bytes",
                file_size,
                u32::MAX,
                self.chunk_size
            ))
        })
    }

    /// Byte range `[index * size, min((index + 1) * size, file_size))`.
    pub fn chunk_range(&self, file_size: u64, chunk_index: u32) -> Result<Range<u64>> {
        let total_chunks = self.total_chunks(file_size)?;
        if chunk_index >= total_chunks {
            return Err(ChunkError::InvalidChunkIndex {
                index: chunk_index,
                total_chunks,
            });
        }

        let start = chunk_index as u64 * self.chunk_size;
        let end = (start + self.chunk_size).min(file_size);
        Ok(start..end)
    }

    pub async fn build_chunk(
        &self,
        file: &RawFile,
        meta: &FileMeta,
        chunk_index: u32,
    ) -> Result<ChunkPacket> {
        let range = self.chunk_range(file.size(), chunk_index)?;
        let data = file.read_range(range.start, range.end).await?;

        Ok(ChunkPacket {
            meta: meta.clone(),
            chunk_index,
            total_chunks: self.total_chunks(file.size())?,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkBuilder::new(0),
            Err(ChunkError::InvalidChunkSize(_))
        ));
    }

    #[test]
    fn test_total_chunks() {
        let builder = ChunkBuilder::new(5 * MIB).unwrap();
        assert_eq!(builder.total_chunks(0).unwrap(), 0);
        assert_eq!(builder.total_chunks(1).unwrap(), 1);
        assert_eq!(builder.total_chunks(5 * MIB).unwrap(), 1);
        assert_eq!(builder.total_chunks(5 * MIB + 1).unwrap(), 2);
        assert_eq!(builder.total_chunks(12 * MIB).unwrap(), 3);
    }

    #[test]
    fn test_chunk_count_beyond_u32_rejected() {
        let builder = ChunkBuilder::new(1).unwrap();
        assert_eq!(builder.total_chunks(u32::MAX as u64).unwrap(), u32::MAX);
        assert!(matches!(
            builder.total_chunks(u32::MAX as u64 + 1),
            Err(ChunkError::InvalidFile(_))
        ));
        assert!(matches!(
            builder.chunk_range(u32::MAX as u64 + 5, 0),
            Err(ChunkError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_ranges_cover_file_without_gaps() {
        for chunk_size in [1u64, 7, 64, 1000] {
            let builder = ChunkBuilder::new(chunk_size).unwrap();
            for file_size in [1u64, 6, 7, 8, 63, 64, 65, 999, 1000, 1001, 4321] {
                let total = builder.total_chunks(file_size).unwrap();
                let mut expected_start = 0;
                for index in 0..total {
                    let range = builder.chunk_range(file_size, index).unwrap();
                    assert_eq!(range.start, expected_start);
                    assert!(range.end > range.start);
                    assert!(range.end - range.start <= chunk_size);
                    expected_start = range.end;
                }
                assert_eq!(expected_start, file_size);
            }
        }
    }

    #[test]
    fn test_index_out_of_range() {
        let builder = ChunkBuilder::new(10).unwrap();
        let result = builder.chunk_range(25, 3);
        assert!(matches!(
            result,
            Err(ChunkError::InvalidChunkIndex {
                index: 3,
                total_chunks: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_build_chunk_packet() {
        let data: Vec<u8> = (0..25u8).collect();
        let file = RawFile::from_bytes("numbers.bin", data.clone());
        let meta = FileMeta::new(file.name()).with_hash("d41d8cd98f00b204e9800998ecf8427e");
        let builder = ChunkBuilder::new(10).unwrap();

        let last = builder.build_chunk(&file, &meta, 2).await.unwrap();
        assert_eq!(last.chunk_index, 2);
        assert_eq!(last.total_chunks, 3);
        assert_eq!(&last.data[..], &data[20..25]);
        assert_eq!(last.meta, meta);

        let fields = last.form_fields();
        assert_eq!(fields[0], ("fileId", meta.file_id.clone()));
        assert_eq!(fields[2], ("fileExtension", ".bin".to_string()));
        assert_eq!(fields[4], ("chunkIndex", "2".to_string()));
        assert_eq!(fields[5], ("totalChunks", "3".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_builds_same_file() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let file = RawFile::from_bytes("cycle.bin", data.clone());
        let meta = FileMeta::new(file.name());
        let builder = ChunkBuilder::new(128).unwrap();

        let total = builder.total_chunks(file.size()).unwrap();
        let packets = futures::future::join_all(
            (0..total).map(|i| builder.build_chunk(&file, &meta, i)),
        )
        .await;

        let mut joined = Vec::new();
        for packet in packets {
            joined.extend_from_slice(&packet.unwrap().data);
        }
        assert_eq!(joined, data);
    }
}
