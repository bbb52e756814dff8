pub mod error;
pub mod hasher;

pub use error::{HashError, HashResult};
pub use hasher::{md5_hex, ContentHasher, HashTask};
