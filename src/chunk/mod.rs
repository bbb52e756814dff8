pub mod builder;
pub mod error;
pub mod types;

pub use builder::ChunkBuilder;
pub use error::{ChunkError, Result};
pub use types::{ChunkPacket, FileMeta, RawFile};
