// Orchestrator - runs the upload, analyze and generate flows against one session

use super::composer::compose;
use super::image::{GeneratedImage, ImageError};
use super::services::{
    HttpImageService, HttpUploadService, HttpVisionService, ImageService, ServiceError, UploadFile,
    UploadService, VisionService,
};
use super::types::{AnalysisOutcome, PromptMerge, SessionState, Status};
use crate::config::{AppConfig, ConfigError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Instruction sent to the vision service alongside the reference image
pub const ANALYSIS_INSTRUCTION: &str =
    "Describe this image in detail focusing on art style, composition, colors, and key elements. Make it suitable as a prompt for generating similar images.";

pub const IMAGE_WIDTH: u32 = 1024;
pub const IMAGE_HEIGHT: u32 = 1024;

/// Owns the session state and drives the external services.
///
/// Flows take `&self`, so the orchestrator can be shared behind an `Arc`.
/// A flow only starts from `Status::Idle`; anything else is rejected with a
/// busy error before any state or network activity. State is published
/// through a watch channel so callers can gate their controls on `status`.
pub struct Orchestrator {
    state: watch::Sender<SessionState>,
    uploader: Arc<dyn UploadService>,
    vision: Arc<dyn VisionService>,
    images: Arc<dyn ImageService>,
    client: reqwest::Client,
    merge: PromptMerge,
}

impl Orchestrator {
    pub fn new(
        uploader: Arc<dyn UploadService>,
        vision: Arc<dyn VisionService>,
        images: Arc<dyn ImageService>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::new());
        Self {
            state,
            uploader,
            vision,
            images,
            client: reqwest::Client::new(),
            merge: PromptMerge::default(),
        }
    }

    /// Wire the HTTP services described by the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        let uploader = Arc::new(HttpUploadService::new(client.clone(), config.upload_url()));
        let vision = Arc::new(HttpVisionService::new(client.clone(), config.vision_url()));
        let images = Arc::new(HttpImageService::new(client.clone(), config.generation_url()));

        Ok(Self::new(uploader, vision, images)
            .with_client(client)
            .with_merge(config.analysis_merge))
    }

    pub fn with_merge(mut self, merge: PromptMerge) -> Self {
        self.merge = merge;
        self
    }

    /// Client used to download remote results
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> Status {
        self.state.borrow().status
    }

    /// Receive a fresh snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.state.send_modify(|s| s.user_prompt = prompt);
    }

    /// Forget the reference image
    pub fn remove_reference(&self) {
        self.state.send_if_modified(|s| s.reference_image_url.take().is_some());
    }

    /// Drop the current result so a new one can be generated
    pub fn dismiss_result(&self) {
        self.state.send_if_modified(|s| s.result_image_url.take().is_some());
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error_message.take().is_some());
    }

    /// Upload a reference image and keep its public URL.
    ///
    /// A failed upload leaves any earlier reference in place.
    pub async fn upload(&self, file: UploadFile) -> Result<String, UploadError> {
        if file.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        let guard = self.begin_idle(Status::Uploading)?;
        tracing::info!(name = %file.name, bytes = file.bytes.len(), "upload started");

        let result = match self.uploader.upload(file).await {
            Ok(response) => match (response.error, response.url) {
                (Some(reason), _) => Err(UploadError::Rejected { reason }),
                (None, Some(url)) if !url.is_empty() => Ok(url),
                (None, _) => Err(UploadError::MissingUrl),
            },
            Err(e) => Err(UploadError::Service(e)),
        };

        match &result {
            Ok(url) => {
                tracing::info!(%url, "upload finished");
                let url = url.clone();
                guard.finish(|s| s.reference_image_url = Some(url));
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = ?e, "upload failed");
                let message = e.to_string();
                guard.finish(|s| s.error_message = Some(message));
            }
        }

        result
    }

    /// Read a file from disk and upload it
    pub async fn upload_path(&self, path: &Path) -> Result<String, UploadError> {
        let file = UploadFile::from_path(path).await.map_err(UploadError::Read)?;
        self.upload(file).await
    }

    /// Ask the vision service to describe the reference image and fold the
    /// description into the prompt according to the merge policy.
    pub async fn analyze(&self) -> Result<AnalysisOutcome, AnalysisError> {
        let Some((guard, image_url)) = self.begin(Status::Analyzing, |s| {
            Ok::<_, AnalysisError>(s.reference_image_url.clone())
        })?
        else {
            tracing::debug!("analyze skipped, no reference image");
            return Ok(AnalysisOutcome::NoReference);
        };
        tracing::info!(%image_url, "analysis started");

        match self.vision.describe(ANALYSIS_INSTRUCTION, &image_url).await {
            Ok(reply) => match reply.description() {
                Some(description) => {
                    let merge = self.merge;
                    let mut merged = String::new();
                    guard.finish(|s| {
                        merged = merge.apply(&s.user_prompt, description);
                        s.user_prompt = merged.clone();
                    });
                    tracing::info!(chars = merged.len(), "analysis finished");
                    Ok(AnalysisOutcome::Applied(merged))
                }
                None => {
                    tracing::warn!("analysis reply carried no description, prompt unchanged");
                    guard.finish(|_| {});
                    Ok(AnalysisOutcome::NoDescription)
                }
            },
            Err(e) => {
                let err = AnalysisError::Service(e);
                tracing::warn!(code = err.code(), error = ?err, "analysis failed");
                let message = err.to_string();
                guard.finish(|s| s.error_message = Some(message));
                Err(err)
            }
        }
    }

    /// Generate an image from the composed prompt.
    ///
    /// Rejected without calling the service when the prompt is empty.
    pub async fn generate(&self) -> Result<String, GenerationError> {
        let Some((guard, (prompt, has_reference))) = self.begin(Status::Generating, |s| {
            if s.user_prompt.is_empty() {
                return Err(GenerationError::EmptyPrompt);
            }
            Ok(Some((s.user_prompt.clone(), s.has_reference())))
        })?
        else {
            return Err(GenerationError::EmptyPrompt);
        };

        let final_prompt = compose(&prompt, has_reference);
        tracing::info!(prompt = %final_prompt, has_reference, "generation started");

        let result = match self.images.generate(&final_prompt, IMAGE_WIDTH, IMAGE_HEIGHT).await {
            Ok(reply) => reply
                .first_image()
                .map(str::to_string)
                .ok_or(GenerationError::NoImage),
            Err(e) => Err(GenerationError::Service(e)),
        };

        match &result {
            Ok(image) => {
                tracing::info!(inline = image.starts_with("data:"), "generation finished");
                let image = image.clone();
                guard.finish(|s| s.result_image_url = Some(image));
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = ?e, "generation failed");
                let message = e.to_string();
                guard.finish(|s| s.error_message = Some(message));
            }
        }

        result
    }

    /// Write the current result image to `path`
    pub async fn save_result(&self, path: &Path) -> Result<u64, ImageError> {
        let value = self
            .state
            .borrow()
            .result_image_url
            .clone()
            .ok_or(ImageError::NoResult)?;
        let image = GeneratedImage::parse(&value)?;
        let written = image.save_to(path, &self.client).await?;
        tracing::info!(path = %path.display(), bytes = written, "result saved");
        Ok(written)
    }

    /// Start a flow whose only precondition is an idle session
    fn begin_idle(&self, status: Status) -> Result<FlowGuard<'_>, Busy> {
        let mut busy = None;
        self.state.send_if_modified(|s| {
            if !s.status.is_idle() {
                busy = Some(Busy(s.status));
                return false;
            }
            s.enter(status);
            true
        });

        match busy {
            Some(busy) => Err(busy),
            None => Ok(FlowGuard {
                state: &self.state,
                status,
                finished: false,
            }),
        }
    }

    /// Start a flow: checks the session is idle, runs `prepare` against the
    /// current state and, if it yields a value, switches to `status`. All of
    /// this happens under the channel's lock so two flows cannot both start.
    ///
    /// `Ok(None)` means there is nothing to do and the state was not touched.
    fn begin<T, E>(
        &self,
        status: Status,
        prepare: impl FnOnce(&SessionState) -> Result<Option<T>, E>,
    ) -> Result<Option<(FlowGuard<'_>, T)>, E>
    where
        E: From<Busy>,
    {
        let mut outcome = None;
        self.state.send_if_modified(|s| {
            if !s.status.is_idle() {
                outcome = Some(Err(E::from(Busy(s.status))));
                return false;
            }
            match prepare(s) {
                Ok(Some(value)) => {
                    s.enter(status);
                    outcome = Some(Ok(Some(value)));
                    true
                }
                other => {
                    outcome = Some(other);
                    false
                }
            }
        });

        match outcome {
            Some(Ok(Some(value))) => Ok(Some((
                FlowGuard {
                    state: &self.state,
                    status,
                    finished: false,
                },
                value,
            ))),
            Some(Ok(None)) | None => Ok(None),
            Some(Err(e)) => Err(e),
        }
    }
}

impl SessionState {
    /// Status switch performed when a flow starts
    fn enter(&mut self, status: Status) {
        self.status = status;
        self.error_message = None;
        if status == Status::Generating {
            self.result_image_url = None;
        }
    }
}

/// Returns the session to idle when a flow ends, including when its future
/// is dropped mid-request.
struct FlowGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    status: Status,
    finished: bool,
}

impl FlowGuard<'_> {
    /// Apply the flow's result and go idle in one update
    fn finish(mut self, apply: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(|s| {
            apply(s);
            s.status = Status::Idle;
        });
        self.finished = true;
    }
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(status = %self.status, "flow cancelled before completion");
        let status = self.status;
        self.state.send_if_modified(|s| {
            if s.status == status {
                s.status = Status::Idle;
                true
            } else {
                false
            }
        });
    }
}

/// Another flow holds the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy(pub Status);

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to upload reference image")]
    Rejected { reason: String },

    #[error("Failed to upload reference image")]
    MissingUrl,

    #[error("Failed to upload reference image")]
    Service(#[source] ServiceError),

    #[error("Failed to read reference image: {0}")]
    Read(#[source] std::io::Error),

    #[error("Reference image file is empty")]
    EmptyFile,

    #[error("Cannot upload while {0}")]
    Busy(Status),
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Rejected { .. } => "rejected",
            UploadError::MissingUrl => "missing_url",
            UploadError::Service(e) => e.code(),
            UploadError::Read(_) => "read",
            UploadError::EmptyFile => "empty_file",
            UploadError::Busy(_) => "busy",
        }
    }
}

impl From<Busy> for UploadError {
    fn from(busy: Busy) -> Self {
        UploadError::Busy(busy.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to analyze image")]
    Service(#[source] ServiceError),

    #[error("Cannot analyze while {0}")]
    Busy(Status),
}

impl AnalysisError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Service(e) => e.code(),
            AnalysisError::Busy(_) => "busy",
        }
    }
}

impl From<Busy> for AnalysisError {
    fn from(busy: Busy) -> Self {
        AnalysisError::Busy(busy.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("No image was generated. Please try again.")]
    NoImage,

    #[error("Failed to generate image. Please try again.")]
    Service(#[source] ServiceError),

    #[error("A prompt is required to generate an image")]
    EmptyPrompt,

    #[error("Cannot generate while {0}")]
    Busy(Status),
}

impl GenerationError {
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::NoImage => "no_image",
            GenerationError::Service(e) => e.code(),
            GenerationError::EmptyPrompt => "empty_prompt",
            GenerationError::Busy(_) => "busy",
        }
    }
}

impl From<Busy> for GenerationError {
    fn from(busy: Busy) -> Self {
        GenerationError::Busy(busy.0)
    }
}
