//! Error types shared across markercut crates.

use std::path::PathBuf;

/// Top-level error type for markercut operations.
#[derive(Debug, thiserror::Error)]
pub enum MarkercutError {
    /// Malformed or degenerate speed-map control points. Fatal to the
    /// marker pair it belongs to; the batch moves on to the next pair.
    #[error("Invalid speed map: {message}")]
    InvalidSpeedMap { message: String },

    #[error("Invalid crop: {message}")]
    InvalidCrop { message: String },

    #[error("Invalid merge list: {message}")]
    MergeList { message: String },

    /// A merge group references a clip that was never generated.
    #[error("Missing clip artifact for marker pair {index}: {reason}")]
    MissingClipArtifact { index: usize, reason: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Markers error: {message}")]
    Markers { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MarkercutError.
pub type MarkercutResult<T> = Result<T, MarkercutError>;

impl MarkercutError {
    pub fn invalid_speed_map(msg: impl Into<String>) -> Self {
        Self::InvalidSpeedMap {
            message: msg.into(),
        }
    }

    pub fn invalid_crop(msg: impl Into<String>) -> Self {
        Self::InvalidCrop {
            message: msg.into(),
        }
    }

    pub fn merge_list(msg: impl Into<String>) -> Self {
        Self::MergeList {
            message: msg.into(),
        }
    }

    pub fn missing_clip(index: usize, reason: impl Into<String>) -> Self {
        Self::MissingClipArtifact {
            index,
            reason: reason.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn markers(msg: impl Into<String>) -> Self {
        Self::Markers {
            message: msg.into(),
        }
    }

    /// Whether this error only invalidates the current marker pair.
    pub fn is_pair_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpeedMap { .. }
                | Self::InvalidCrop { .. }
                | Self::Encode { .. }
                | Self::FileNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = MarkercutError::missing_clip(3, "no output file");
        assert_eq!(
            err.to_string(),
            "Missing clip artifact for marker pair 3: no output file"
        );

        let err = MarkercutError::invalid_speed_map("needs at least two points");
        assert!(err.to_string().contains("two points"));
    }

    #[test]
    fn test_pair_local_classification() {
        assert!(MarkercutError::invalid_speed_map("x").is_pair_local());
        assert!(MarkercutError::encode("ffmpeg exited 1").is_pair_local());
        assert!(!MarkercutError::merge_list("bad token").is_pair_local());
    }
}
