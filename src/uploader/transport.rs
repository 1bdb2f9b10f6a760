use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FileRecord, UploadResponse};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Request(String),

    #[error("Upload failed with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// One request carrying the whole file and its metadata. The transfer is
/// atomic from the manager's point of view; there is no chunking and no way
/// to abort it once issued.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<FileRecord, TransportError>;
}

/// Multipart POST to the server's upload endpoint, authenticated with a
/// bearer session token. No client-side timeout is applied; a hung request
/// leaves its item uploading until the user dismisses it.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl HttpTransport {
    pub fn new(base_url: String, session_token: String) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token,
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<FileRecord, TransportError> {
        let mut part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
        if let Some(content_type) = content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| TransportError::Request(e.to_string()))?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .bearer_auth(&self.session_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(body.file)
    }
}
