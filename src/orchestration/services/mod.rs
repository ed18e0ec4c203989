// External collaborators the session talks to

mod generation;
mod upload;
mod vision;

pub use generation::HttpImageService;
pub use upload::HttpUploadService;
pub use vision::HttpVisionService;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Accepts a binary file and hands back a publicly fetchable URL
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<UploadResponse, ServiceError>;
}

/// Describes an image in free text following an instruction
#[async_trait]
pub trait VisionService: Send + Sync {
    async fn describe(
        &self,
        instruction: &str,
        image_url: &str,
    ) -> Result<ChatCompletion, ServiceError>;
}

/// Produces an image from a text prompt
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GenerationResponse, ServiceError>;
}

/// A user-selected file ready to be sent to the upload service
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_from_extension)
            .unwrap_or("application/octet-stream");

        Ok(Self::new(name, content_type, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Detect an image MIME type from a file extension
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Upload service reply: either `{ "url": ... }` or `{ "error": ... }`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Vision service reply, `{ "choices": [ { "message": { "content": ... } } ] }`
///
/// Kept as raw JSON: any shape decodes, and a reply without a usable
/// description is simply one where `description()` is `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatCompletion(pub Value);

impl ChatCompletion {
    /// Reply carrying a single text description
    pub fn with_content(content: impl Into<String>) -> Self {
        let content: String = content.into();
        Self(serde_json::json!({
            "choices": [{ "message": { "content": content } }]
        }))
    }

    /// Text of the first choice, if it is a non-empty string
    pub fn description(&self) -> Option<&str> {
        self.0
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Generation service reply, `{ "data": [ <url or data URI> ] }`
///
/// Raw JSON like [`ChatCompletion`]; a reply of any shape without an image
/// yields `first_image() == None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationResponse(pub Value);

impl GenerationResponse {
    pub fn with_images(images: &[&str]) -> Self {
        Self(serde_json::json!({ "data": images }))
    }

    /// First image in the reply, if it is a non-empty string
    pub fn first_image(&self) -> Option<&str> {
        self.0
            .pointer("/data/0")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NetworkError(_) => "network",
            ServiceError::HttpError { .. } => "http_status",
            ServiceError::ParseError(_) => "parse",
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::ParseError(err.to_string())
        } else {
            ServiceError::NetworkError(err.to_string())
        }
    }
}

/// Check the status and decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::HttpError {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ServiceError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_from_extension("PNG"), "image/png");
        assert_eq!(mime_from_extension("jpeg"), "image/jpeg");
        assert_eq!(mime_from_extension("tiff"), "application/octet-stream");
    }

    #[test]
    fn test_upload_response_shapes() {
        let ok: UploadResponse = serde_json::from_str(r#"{"url":"https://cdn/x.png"}"#).unwrap();
        assert_eq!(ok.url.as_deref(), Some("https://cdn/x.png"));
        assert!(ok.error.is_none());

        let err: UploadResponse = serde_json::from_str(r#"{"error":"too large"}"#).unwrap();
        assert_eq!(err.error.as_deref(), Some("too large"));
    }

    #[test]
    fn test_description_tolerates_partial_replies() {
        for body in [
            r#"{}"#,
            r#"{"choices":null}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":""}}]}"#,
            r#"{"choices":[{"message":{"content":42}}]}"#,
            r#"{"choices":[null]}"#,
            r#"{"choices":{"message":"x"}}"#,
            r#"{"choices":"nope"}"#,
            r#"{"choices":[{"message":"just text"}]}"#,
            r#"[]"#,
            r#"null"#,
        ] {
            let reply: ChatCompletion = serde_json::from_str(body).unwrap();
            assert_eq!(reply.description(), None, "body: {}", body);
        }

        let reply: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"A serene mountain"}}]}"#)
                .unwrap();
        assert_eq!(reply.description(), Some("A serene mountain"));
    }

    #[test]
    fn test_first_image() {
        let empty: GenerationResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert_eq!(empty.first_image(), None);

        let missing: GenerationResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(missing.first_image(), None);

        for body in [r#"{"data":[null]}"#, r#"{"data":{}}"#, r#"{"data":"x"}"#, r#"[]"#] {
            let reply: GenerationResponse = serde_json::from_str(body).unwrap();
            assert_eq!(reply.first_image(), None, "body: {}", body);
        }

        let ok: GenerationResponse =
            serde_json::from_str(r#"{"data":["http://x/img.png"]}"#).unwrap();
        assert_eq!(ok.first_image(), Some("http://x/img.png"));
    }

    #[tokio::test]
    async fn test_upload_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.JPG");
        tokio::fs::write(&path, b"\xff\xd8\xff").await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "ref.JPG");
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.bytes.len(), 3);
        assert!(!file.is_empty());
    }
}
