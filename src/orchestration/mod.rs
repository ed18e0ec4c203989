// Orchestration system - upload, analyze and generate flows over one session

pub mod composer;
pub mod image;
pub mod orchestrator;
pub mod services;
pub mod types;

pub use composer::compose;
pub use image::GeneratedImage;
pub use orchestrator::{AnalysisError, GenerationError, Orchestrator, UploadError};
pub use types::*;
