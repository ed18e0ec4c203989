// Multipart upload client

use super::{read_json, ServiceError, UploadFile, UploadResponse, UploadService};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

/// Posts the file as a single multipart part named `file`
pub struct HttpUploadService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploadService {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UploadService for HttpUploadService {
    async fn upload(&self, file: UploadFile) -> Result<UploadResponse, ServiceError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            name = %file.name,
            bytes = file.bytes.len(),
            "uploading file"
        );

        let part = Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.content_type)
            .map_err(|e| ServiceError::ParseError(format!("Invalid content type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::NetworkError(e.to_string()))?;

        read_json(response).await
    }
}
