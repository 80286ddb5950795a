//! Error types shared across Lammah crates.

use std::path::PathBuf;

/// Top-level error type for Lammah operations.
#[derive(Debug, thiserror::Error)]
pub enum LammahError {
    /// The input video could not be loaded or its metadata could not be read.
    #[error("Source decode error: {message}")]
    SourceDecode { message: String },

    /// Capture surface or encoder setup, streaming, or finalization failed.
    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LammahError.
pub type LammahResult<T> = Result<T, LammahError>;

impl LammahError {
    pub fn source_decode(msg: impl Into<String>) -> Self {
        Self::SourceDecode {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error belongs to the overlay phase and may be absorbed
    /// by substituting the original video.
    ///
    /// Cancellation is never absorbed: it is the caller asking to stop.
    pub fn is_overlay_failure(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_message() {
        let err = LammahError::encode("vp9 encoder missing");
        assert_eq!(err.to_string(), "Encode error: vp9 encoder missing");

        let err = LammahError::FileNotFound {
            path: PathBuf::from("/tmp/missing.mp4"),
        };
        assert_eq!(err.to_string(), "File not found: /tmp/missing.mp4");
    }

    #[test]
    fn test_cancellation_is_not_an_overlay_failure() {
        assert!(!LammahError::Cancelled.is_overlay_failure());
        assert!(LammahError::source_decode("bad header").is_overlay_failure());
        assert!(LammahError::encode("broken pipe").is_overlay_failure());
        let io = LammahError::from(std::io::Error::other("disk full"));
        assert!(io.is_overlay_failure());
    }
}
