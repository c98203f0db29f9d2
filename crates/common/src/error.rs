//! Error types shared across motiongate crates.

use std::path::PathBuf;

/// Top-level error type for motiongate operations.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("Allocation failed: {message}")]
    Allocation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Helper process error: {message}")]
    Process { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MotionError.
pub type MotionResult<T> = Result<T, MotionError>;

impl MotionError {
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process {
            message: msg.into(),
        }
    }
}
