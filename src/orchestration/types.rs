// Core types for the session

use serde::{Deserialize, Serialize};

/// What the session is currently doing
///
/// Exactly one status holds at a time. Every flow other than the one
/// already running is rejected unless the session is `Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Uploading,
    Analyzing,
    Generating,
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Idle => "idle",
            Status::Uploading => "uploading",
            Status::Analyzing => "analyzing",
            Status::Generating => "generating",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Status::Idle)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single record a user session mutates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    /// Raw prompt text; empty means "no prompt yet"
    pub user_prompt: String,

    /// Public URL returned by the upload service, never a local path
    pub reference_image_url: Option<String>,

    /// URL or data URI of the last generated image
    pub result_image_url: Option<String>,

    pub status: Status,

    /// Last failure, cleared when a new flow starts
    pub error_message: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_reference(&self) -> bool {
        self.reference_image_url.is_some()
    }

    /// Whether the generate action should be offered at all
    pub fn can_generate(&self) -> bool {
        self.status.is_idle() && !self.user_prompt.is_empty()
    }
}

/// How an image description is folded into the current prompt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptMerge {
    /// Overwrite whatever the user typed
    #[default]
    Replace,
    /// Keep the typed prompt and add the description after it
    Append,
}

impl PromptMerge {
    pub fn apply(&self, current: &str, description: &str) -> String {
        match self {
            PromptMerge::Replace => description.to_string(),
            PromptMerge::Append if current.trim().is_empty() => description.to_string(),
            PromptMerge::Append => format!("{}, {}", current.trim_end(), description),
        }
    }
}

impl std::str::FromStr for PromptMerge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" | "overwrite" => Ok(PromptMerge::Replace),
            "append" => Ok(PromptMerge::Append),
            other => Err(format!("unknown merge policy: {}", other)),
        }
    }
}

/// Result of a completed analyze flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// No reference image was set; nothing happened
    NoReference,
    /// The service answered without a usable description; prompt untouched
    NoDescription,
    /// The prompt now reads as given
    Applied(String),
}
