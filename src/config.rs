// Endpoint and behavior configuration

use crate::orchestration::PromptMerge;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for in the working directory, then in `$HOME`
pub const CONFIG_FILE_NAME: &str = ".animagen.json";

/// Overrides `base_url` when set
pub const BASE_URL_ENV: &str = "ANIMAGEN_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Host every service path is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    #[serde(default = "default_vision_path")]
    pub vision_path: String,

    #[serde(default = "default_generation_path")]
    pub generation_path: String,

    /// Whole-request timeout applied by the HTTP client, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// How an image description lands in the prompt
    #[serde(default)]
    pub analysis_merge: PromptMerge,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_upload_path() -> String {
    "/_create/api/upload/".to_string()
}

fn default_vision_path() -> String {
    "/integrations/gpt-vision/".to_string()
}

fn default_generation_path() -> String {
    "/integrations/stable-diffusion-v-3/".to_string()
}

fn default_request_timeout() -> u64 {
    120_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_path: default_upload_path(),
            vision_path: default_vision_path(),
            generation_path: default_generation_path(),
            request_timeout_ms: default_request_timeout(),
            analysis_merge: PromptMerge::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Explicit path if given, otherwise the first config file found, otherwise
    /// defaults. The base URL environment override is applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit.map(Path::to_path_buf).or_else(find_config) {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading configuration");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }

        Ok(config)
    }

    pub fn upload_url(&self) -> String {
        join_url(&self.base_url, &self.upload_path)
    }

    pub fn vision_url(&self) -> String {
        join_url(&self.base_url, &self.vision_path)
    }

    pub fn generation_url(&self) -> String {
        join_url(&self.base_url, &self.generation_path)
    }
}

/// Absolute paths (with a scheme) are used as-is
fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn find_config() -> Option<PathBuf> {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return Some(local_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(CONFIG_FILE_NAME);
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
