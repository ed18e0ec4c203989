// Vision description client

use super::{read_json, ChatCompletion, ServiceError, VisionService};
use async_trait::async_trait;
use serde::Serialize;

/// Sends one user message holding the instruction and the image URL
pub struct HttpVisionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVisionService {
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
impl VisionService for HttpVisionService {
    async fn describe(
        &self,
        instruction: &str,
        image_url: &str,
    ) -> Result<ChatCompletion, ServiceError> {
        tracing::debug!(endpoint = %self.endpoint, image_url, "requesting image description");

        let request = VisionRequest::new(instruction, image_url);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::NetworkError(e.to_string()))?;

        read_json(response).await
    }
}

#[derive(Debug, Serialize)]
struct VisionRequest<'a> {
    messages: Vec<VisionMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct VisionMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

impl<'a> VisionRequest<'a> {
    fn new(instruction: &'a str, image_url: &'a str) -> Self {
        Self {
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: instruction },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
        }
    }
}
