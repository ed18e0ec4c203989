// Image generation client

use super::{read_json, GenerationResponse, ImageService, ServiceError};
use async_trait::async_trait;

/// Issues `GET <endpoint>?prompt=..&width=..&height=..`
pub struct HttpImageService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageService {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The prompt is percent-encoded so spaces become `%20`, not `+`
    fn request_url(&self, prompt: &str, width: u32, height: u32) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}prompt={}&width={}&height={}",
            self.endpoint,
            separator,
            urlencoding::encode(prompt),
            width,
            height
        )
    }
}

#[async_trait]
impl ImageService for HttpImageService {
    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GenerationResponse, ServiceError> {
        let url = self.request_url(prompt, width, height);
        tracing::debug!(%url, "requesting image generation");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::NetworkError(e.to_string()))?;

        read_json(response).await
    }
}
