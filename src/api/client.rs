use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::error::{ApiError, ApiResult};
use crate::api::token::TokenStore;
use crate::api::types::{
    Access, LoginRequest, ShareAuthRequest, ShareAuthResponse, ShareRequest, ShareResponse,
    SharedFile, SharedFilesResponse, TokenResponse,
};
use crate::config::{ClientConfig, Endpoints};
use crate::network::HttpChunkTransport;

/// Bodies of a 401 that mean "refresh and try again".
const EXPIRED_TOKEN_BODIES: [&str; 2] = ["Unauthorized", "The incoming token has expired"];

/// Client for the auth, share and download endpoints.
///
/// Refresh relies on the session cookie set by `login`, so the underlying
/// client keeps a cookie store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    tokens: TokenStore,
    refresh_lock: Arc<Mutex<()>>,
    otp_length: usize,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("shareflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(http, config))
    }

    pub fn with_http(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            endpoints: config.endpoints.clone(),
            tokens: TokenStore::new(),
            refresh_lock: Arc::new(Mutex::new(())),
            otp_length: config.otp_length,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Chunk transport sharing this client's connection pool and token.
    pub fn chunk_transport(&self) -> HttpChunkTransport {
        HttpChunkTransport::new(self.http.clone(), self.endpoints.upload_url.clone())
            .with_session(self.clone())
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<TokenResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self
            .http
            .post(&self.endpoints.login_url)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = json_body(resp).await?;

        self.tokens.set(token.access_token.clone());
        tracing::info!(user = username, "logged in");
        Ok(token)
    }

    /// Trade the session cookie for a fresh access token.
    ///
    /// Any failure clears the stored token.
    pub async fn refresh(&self) -> ApiResult<TokenResponse> {
        match self.request_refresh().await {
            Ok(token) => {
                self.tokens.set(token.access_token.clone());
                tracing::debug!("access token refreshed");
                Ok(token)
            }
            Err(e) => {
                self.tokens.clear();
                tracing::warn!("token refresh failed: {}", e);
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> ApiResult<()> {
        let result = self.http.post(&self.endpoints.logout_url).send().await;
        self.tokens.clear();
        check_status(result?).await?;
        Ok(())
    }

    /// Create a password-protected shared folder.
    pub async fn create_share(
        &self,
        access: Access,
        folder_name: &str,
        otp: &str,
        expiration_date: DateTime<Utc>,
    ) -> ApiResult<ShareResponse> {
        if !self.is_valid_otp(otp) {
            return Err(ApiError::InvalidOtp {
                expected: self.otp_length,
            });
        }
        if expiration_date <= Utc::now() {
            return Err(ApiError::InvalidExpiration);
        }

        let body = ShareRequest {
            access,
            folder_name: folder_name.to_string(),
            otp: otp.to_string(),
            expiration_date,
        };
        let resp = self
            .send_authorized(|http| http.post(&self.endpoints.share_url).json(&body))
            .await?;
        let share: ShareResponse = json_body(resp).await?;

        tracing::info!(folder_id = %share.folder_id, access = %access, "shared folder created");
        Ok(share)
    }

    /// Unlock a shared folder with its OTP and keep the issued token.
    pub async fn authenticate_share(&self, link_url: &str, otp: &str) -> ApiResult<ShareAuthResponse> {
        let body = ShareAuthRequest {
            link_url: link_url.to_string(),
            otp: otp.to_string(),
        };
        let resp = self
            .http
            .post(&self.endpoints.auth_share_url)
            .json(&body)
            .send()
            .await?;
        let auth: ShareAuthResponse = json_body(resp).await?;

        self.tokens.set(auth.access_token.clone());
        tracing::info!(folder_id = %auth.folder_id, "shared folder unlocked");
        Ok(auth)
    }

    /// Files in a shared folder, without the zip bundle.
    pub async fn list_shared_files(&self, folder_id: &str) -> ApiResult<Vec<SharedFile>> {
        let resp = self
            .send_authorized(|http| {
                http.get(&self.endpoints.list_shared_files_url)
                    .query(&[("folder_id", folder_id)])
            })
            .await?;
        let listing: SharedFilesResponse = json_body(resp).await?;

        Ok(listing
            .files
            .into_iter()
            .filter(|f| !f.is_bundle())
            .collect())
    }

    /// Whether the server can serve `file` from the folder right now.
    pub async fn download_available(&self, folder_id: &str, file: &str) -> ApiResult<bool> {
        let resp = self
            .send_authorized(|http| {
                http.get(&self.endpoints.download_available_url)
                    .query(&[("folder_id", folder_id), ("file", file)])
            })
            .await?;
        Ok(resp.status() == StatusCode::OK)
    }

    pub async fn download_file(&self, folder_id: &str, file_name: &str) -> ApiResult<Bytes> {
        if !self.download_available(folder_id, file_name).await? {
            tracing::info!(folder_id, file_name, "download not ready yet");
            return Err(ApiError::NotReady);
        }

        let resp = self
            .send_authorized(|http| {
                http.get(&self.endpoints.download_url)
                    .query(&[("file", file_name), ("folder_id", folder_id)])
            })
            .await?;
        let data = check_status(resp).await?.bytes().await?;

        tracing::info!(folder_id, file_name, bytes = data.len(), "download finished");
        Ok(data)
    }

    /// The whole folder as the server-built zip.
    pub async fn download_zip(&self, folder_id: &str) -> ApiResult<Bytes> {
        self.download_file(folder_id, &bundle_name(folder_id)).await
    }

    /// Download and write to `path`. Returns the byte count.
    pub async fn download_file_to(&self, folder_id: &str, file_name: &str, path: &Path) -> ApiResult<u64> {
        let data = self.download_file(folder_id, file_name).await?;
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }

    /// Refresh after the server rejected `sent` as expired, unless a
    /// concurrent request already replaced it.
    pub(crate) async fn refresh_rejected(&self, sent: Option<&str>) -> ApiResult<()> {
        let _guard = self.refresh_lock.lock().await;
        if self.tokens.get().as_deref() != sent {
            return Ok(());
        }
        self.refresh().await.map(|_| ())
    }

    async fn request_refresh(&self) -> ApiResult<TokenResponse> {
        let resp = self
            .http
            .post(&self.endpoints.refresh_url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        json_body(resp).await
    }

    fn is_valid_otp(&self, otp: &str) -> bool {
        otp.len() == self.otp_length && otp.bytes().all(|b| b.is_ascii_digit())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.get() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send with the bearer token; on an expired-token 401, refresh once
    /// and re-issue once.
    async fn send_authorized<F>(&self, build: F) -> ApiResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let resp = self.authorize(build(&self.http)).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if !is_expired_token(&body) {
            return Err(ApiError::Api {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                body,
            });
        }

        tracing::debug!("access token rejected, refreshing");
        self.refresh().await?;

        let resp = self.authorize(build(&self.http)).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Ok(resp)
    }
}

pub(crate) fn is_expired_token(body: &str) -> bool {
    EXPIRED_TOKEN_BODIES.contains(&body.trim())
}

fn bundle_name(folder_id: &str) -> String {
    format!("{folder_id}.zip")
}

async fn check_status(resp: Response) -> ApiResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn json_body<T: serde::de::DeserializeOwned>(resp: Response) -> ApiResult<T> {
    let bytes = check_status(resp).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn client() -> ApiClient {
        let config = ClientConfig {
            // Nothing listens here; validation must fail before any request.
            endpoints: Endpoints::from_base_url("http://127.0.0.1:9"),
            ..Default::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_expired_token_bodies() {
        assert!(is_expired_token("Unauthorized"));
        assert!(is_expired_token("  The incoming token has expired\n"));
        assert!(!is_expired_token("Forbidden"));
        assert!(!is_expired_token(""));
    }

    #[test]
    fn test_bundle_name() {
        assert_eq!(bundle_name("f-1"), "f-1.zip");
    }

    #[test]
    fn test_otp_validation() {
        let client = client();
        assert!(client.is_valid_otp("123456"));
        assert!(!client.is_valid_otp("12345"));
        assert!(!client.is_valid_otp("1234567"));
        assert!(!client.is_valid_otp("12a456"));
        assert!(!client.is_valid_otp("１２３４５６"));
    }

    #[tokio::test]
    async fn test_create_share_rejects_bad_input() {
        let client = client();
        let tomorrow = Utc::now() + Duration::days(1);

        let result = client
            .create_share(Access::Read, "trip", "12", tomorrow)
            .await;
        assert!(matches!(result, Err(ApiError::InvalidOtp { expected: 6 })));

        let yesterday = Utc::now() - Duration::days(1);
        let result = client
            .create_share(Access::Read, "trip", "123456", yesterday)
            .await;
        assert!(matches!(result, Err(ApiError::InvalidExpiration)));
    }
}
