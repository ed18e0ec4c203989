// animagen - prompt-to-image orchestration with optional reference image analysis

pub mod config;
pub mod orchestration;

pub use config::AppConfig;
pub use orchestration::{Orchestrator, SessionState, Status};
