use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};

use crate::api::client::is_expired_token;
use crate::api::ApiClient;
use crate::chunk::ChunkPacket;
use crate::network::error::{NetworkError, NetworkResult};
use crate::network::transport::ChunkTransport;
use crate::network::types::FOLDER_ID_HEADER;

/// Posts chunks as multipart forms to the upload endpoint.
pub struct HttpChunkTransport {
    http: reqwest::Client,
    upload_url: String,
    session: Option<ApiClient>,
}

impl HttpChunkTransport {
    pub fn new(http: reqwest::Client, upload_url: impl Into<String>) -> Self {
        Self {
            http,
            upload_url: upload_url.into(),
            session: None,
        }
    }

    /// Authenticate chunks with this client's bearer token, refreshing it
    /// when the server reports it expired.
    pub fn with_session(mut self, session: ApiClient) -> Self {
        self.session = Some(session);
        self
    }

    fn build_form(packet: &ChunkPacket) -> NetworkResult<Form> {
        let mut form = Form::new();
        for (name, value) in packet.form_fields() {
            form = form.text(name, value);
        }

        let chunk = Part::stream(packet.data.clone())
            .file_name(packet.meta.display_name())
            .mime_str("application/octet-stream")
            .map_err(|e| NetworkError::InvalidHeader(e.to_string()))?;

        Ok(form.part("chunk", chunk))
    }

    async fn post(
        &self,
        packet: &ChunkPacket,
        folder_id: Option<&str>,
        token: Option<&str>,
    ) -> NetworkResult<Response> {
        // Multipart forms are consumed on send, so every attempt builds its own.
        let form = Self::build_form(packet)?;
        let mut request = self.http.post(&self.upload_url).multipart(form);

        if let Some(folder_id) = folder_id {
            request = request.header(FOLDER_ID_HEADER, folder_id);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn send_chunk(&self, packet: &ChunkPacket, folder_id: Option<&str>) -> NetworkResult<()> {
        let token = self.session.as_ref().and_then(|s| s.tokens().get());
        let mut resp = self.post(packet, folder_id, token.as_deref()).await?;

        if let Some(session) = &self.session {
            if resp.status() == StatusCode::UNAUTHORIZED {
                let body = resp.text().await.unwrap_or_default();
                if !is_expired_token(&body) {
                    return Err(NetworkError::Status {
                        status: StatusCode::UNAUTHORIZED.as_u16(),
                        body,
                    });
                }

                tracing::debug!(
                    file_id = %packet.meta.file_id,
                    chunk_index = packet.chunk_index,
                    "upload token rejected, refreshing"
                );
                session
                    .refresh_rejected(token.as_deref())
                    .await
                    .map_err(|e| NetworkError::RefreshFailed(e.to_string()))?;

                let token = session.tokens().get();
                resp = self.post(packet, folder_id, token.as_deref()).await?;
            }
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
