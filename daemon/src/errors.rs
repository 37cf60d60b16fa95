//! Error types for the camera daemon

use std::time::Duration;

use thiserror::Error;

use crate::command::parser::ParseError;
use crate::naming::template::TemplateError;

/// Main error type for the camera daemon
#[derive(Error, Debug)]
pub enum CamError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Template error: {0}")]
    TemplateError(#[from] TemplateError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Camera {0} is stopped")]
    CameraStopped(usize),

    #[error("Camera {0} is already recording")]
    AlreadyRecording(usize),

    #[error("Restart of camera {camera} failed: {reason}")]
    RestartFailed { camera: usize, reason: String },

    #[error("Camera {camera} did not become available within {timeout:?}")]
    RestartTimeout { camera: usize, timeout: Duration },

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Macro error: {0}")]
    MacroError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CamError {
    /// Conditions that are reported but leave the camera fully usable
    pub fn is_benign(&self) -> bool {
        matches!(self, CamError::AlreadyRecording(_))
    }
}

impl From<anyhow::Error> for CamError {
    fn from(err: anyhow::Error) -> Self {
        CamError::Internal(err.to_string())
    }
}
