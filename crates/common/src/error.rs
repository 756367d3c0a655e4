//! Error types shared across SteadyFrame crates.

use std::path::PathBuf;

/// Top-level error type for SteadyFrame operations.
#[derive(Debug, thiserror::Error)]
pub enum SteadyError {
    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Stabilization data error: {message}")]
    Store { message: String },

    #[error("Image error: {message}")]
    Image { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A frame index was requested that the stabilization tables do not
    /// contain. Never substituted with a default transform.
    #[error("No stabilization data for frame {frame_index}")]
    MissingFrame { frame_index: u64 },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SteadyError.
pub type SteadyResult<T> = Result<T, SteadyError>;

impl SteadyError {
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn missing_frame(frame_index: u64) -> Self {
        Self::MissingFrame { frame_index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_frame_message_names_index() {
        let err = SteadyError::missing_frame(42);
        assert_eq!(err.to_string(), "No stabilization data for frame 42");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SteadyError = io.into();
        assert!(matches!(err, SteadyError::Io(_)));
    }
}
