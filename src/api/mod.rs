pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use token::{decode_claims, TokenClaims, TokenStore};
pub use types::*;
