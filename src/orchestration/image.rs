// Generated image handling - remote URLs and inline data URIs

use base64::Engine;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// An image returned by the generation service
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedImage {
    /// Fetchable URL
    Remote(String),
    /// `data:<mime>;base64,<payload>` decoded in place
    Inline { mime: String, bytes: Vec<u8> },
}

impl GeneratedImage {
    /// Classify the value stored in `result_image_url`
    pub fn parse(value: &str) -> Result<Self, ImageError> {
        let Some(rest) = value.strip_prefix("data:") else {
            return Ok(GeneratedImage::Remote(value.to_string()));
        };

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidDataUri("missing ',' separator".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| {
                ImageError::InvalidDataUri("only base64 payloads are supported".into())
            })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::InvalidDataUri(e.to_string()))?;

        Ok(GeneratedImage::Inline {
            mime: if mime.is_empty() { "image/png".to_string() } else { mime.to_string() },
            bytes,
        })
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, GeneratedImage::Inline { .. })
    }

    /// Write the image to `path`, downloading it first if it is remote.
    /// Returns the number of bytes written.
    pub async fn save_to(&self, path: &Path, client: &reqwest::Client) -> Result<u64, ImageError> {
        match self {
            GeneratedImage::Inline { bytes, .. } => {
                tokio::fs::write(path, bytes).await?;
                Ok(bytes.len() as u64)
            }
            GeneratedImage::Remote(url) => {
                tracing::debug!(%url, path = %path.display(), "downloading generated image");
                let response = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| ImageError::Download(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(ImageError::Download(format!("HTTP {}", response.status())));
                }

                // Nothing lands at `path` unless the whole body arrived
                let partial = partial_path(path);
                match stream_to_file(response, &partial).await {
                    Ok(written) => {
                        tokio::fs::rename(&partial, path).await?;
                        Ok(written)
                    }
                    Err(e) => {
                        let _ = tokio::fs::remove_file(&partial).await;
                        Err(e)
                    }
                }
            }
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, ImageError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ImageError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// `anime-art-<timestamp>.png` in the given directory
pub fn default_file_name(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("anime-art-{}.png", stamp))
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("No generated image to save")]
    NoResult,

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
