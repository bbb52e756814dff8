//! Chunked, resumable file uploads to a file-sharing server.
//!
//! Files are staged in a [`session::FileSetManager`], hashed in the
//! background, then sent one at a time as fixed-size chunks over a bounded
//! window of concurrent requests. The [`api`] module covers the share,
//! auth and download endpoints of the same server.

pub mod api;
pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod integrity;
pub mod metrics;
pub mod network;
pub mod session;
