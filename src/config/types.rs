use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};

pub const DEFAULT_DOMAIN: &str = "mydomain.com";

/// Largest accepted chunk, in MiB. Each in-flight chunk is held in memory.
pub const MAX_CHUNK_SIZE_MB: u64 = 1024;

/// Server endpoints consumed by the client.
///
/// Paths are configuration, not protocol: every endpoint can be pointed
/// somewhere else, which is how the tests aim the client at a local server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub upload_url: String,
    pub auth_share_url: String,
    pub share_url: String,
    pub list_shared_files_url: String,
    pub download_available_url: String,
    pub download_url: String,
    pub login_url: String,
    pub refresh_url: String,
    pub logout_url: String,
}

impl Endpoints {
    /// Endpoints served from `https://api.<domain>`.
    pub fn for_domain(domain: &str) -> Self {
        Self::from_base_url(&format!("https://api.{domain}"))
    }

    /// Endpoints rooted at an arbitrary base URL (no trailing slash).
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            base_url: base.to_string(),
            upload_url: format!("{base}/upload"),
            auth_share_url: format!("{base}/auth-share"),
            share_url: format!("{base}/share"),
            list_shared_files_url: format!("{base}/share-files"),
            download_available_url: format!("{base}/download-available"),
            download_url: format!("{base}/download"),
            login_url: format!("{base}/login"),
            refresh_url: format!("{base}/refresh"),
            logout_url: format!("{base}/logout"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::for_domain(DEFAULT_DOMAIN)
    }
}

/// Static client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub chunk_size_mb: u64,
    pub max_chunk_retries: u32,
    pub max_concurrent_chunks: usize,
    pub max_file_size: u64,
    pub otp_length: usize,
    /// Delay between chunk retries. Zero keeps retries immediate.
    pub retry_backoff_ms: u64,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: 5,
            max_chunk_retries: 5,
            max_concurrent_chunks: 6,
            max_file_size: 5 * 1024 * 1024 * 1024,
            otp_length: 6,
            retry_backoff_ms: 0,
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    pub fn for_domain(domain: &str) -> Self {
        Self {
            endpoints: Endpoints::for_domain(domain),
            ..Default::default()
        }
    }

    /// Build from `SHAREFLOW_*` environment variables.
    ///
    /// `SHAREFLOW_DOMAIN` is required; tuning knobs fall back to defaults.
    pub fn from_env() -> ConfigResult<Self> {
        let domain = std::env::var("SHAREFLOW_DOMAIN")
            .map_err(|_| ConfigError::MissingVar("SHAREFLOW_DOMAIN".into()))?;
        if domain.trim().is_empty() {
            return Err(ConfigError::MissingVar("SHAREFLOW_DOMAIN".into()));
        }

        let mut config = Self::for_domain(domain.trim());
        if let Some(v) = env_parse("SHAREFLOW_CHUNK_SIZE_MB")? {
            config.chunk_size_mb = v;
        }
        if let Some(v) = env_parse("SHAREFLOW_MAX_RETRIES")? {
            config.max_chunk_retries = v;
        }
        if let Some(v) = env_parse("SHAREFLOW_MAX_CONCURRENT_CHUNKS")? {
            config.max_concurrent_chunks = v;
        }
        if let Some(v) = env_parse("SHAREFLOW_MAX_FILE_SIZE")? {
            config.max_file_size = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.chunk_size_mb == 0 {
            return Err(ConfigError::Invalid("chunk_size_mb must be positive".into()));
        }
        if self.chunk_size_mb > MAX_CHUNK_SIZE_MB {
            return Err(ConfigError::Invalid(format!(
                "chunk_size_mb must be at most {MAX_CHUNK_SIZE_MB}"
            )));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_chunks must be positive".into(),
            ));
        }
        if self.otp_length == 0 {
            return Err(ConfigError::Invalid("otp_length must be positive".into()));
        }
        Ok(())
    }

    /// CHUNK_SIZE in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn env_parse<T: FromStr>(key: &str) -> ConfigResult<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = ClientConfig::default();
        assert_eq!(config.chunk_size(), 5 * 1024 * 1024);
        assert_eq!(config.max_chunk_retries, 5);
        assert_eq!(config.max_concurrent_chunks, 6);
        assert_eq!(config.otp_length, 6);
        assert_eq!(config.retry_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_endpoints_for_domain() {
        let endpoints = Endpoints::for_domain("example.org");
        assert_eq!(endpoints.base_url, "https://api.example.org");
        assert_eq!(endpoints.upload_url, "https://api.example.org/upload");
        assert_eq!(
            endpoints.download_available_url,
            "https://api.example.org/download-available"
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let endpoints = Endpoints::from_base_url("http://127.0.0.1:8080/");
        assert_eq!(endpoints.share_url, "http://127.0.0.1:8080/share");
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ClientConfig {
            max_concurrent_chunks: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_bounds_chunk_size() {
        let mut config = ClientConfig {
            chunk_size_mb: MAX_CHUNK_SIZE_MB,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.chunk_size_mb = MAX_CHUNK_SIZE_MB + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.chunk_size_mb = u64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.chunk_size(), u64::MAX);
    }

    #[test]
    fn test_from_json_file_rejects_huge_chunks() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size_mb": 18446744073709551615}}"#).unwrap();
        file.flush().unwrap();

        assert!(matches!(
            ClientConfig::from_json_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size_mb": 2, "max_chunk_retries": 1}}"#).unwrap();
        file.flush().unwrap();

        let config = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.chunk_size(), 2 * 1024 * 1024);
        assert_eq!(config.max_chunk_retries, 1);
        assert_eq!(config.max_concurrent_chunks, 6);
    }
}
