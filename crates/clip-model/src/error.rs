//! Errors raised while loading or interpreting clip model data.

use std::path::PathBuf;

use markercut_common::MarkercutError;

/// Errors that can occur when working with markers and clip settings.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid crop '{crop}': {message}")]
    InvalidCrop { crop: String, message: String },

    #[error("Invalid frame rate '{value}'")]
    InvalidFrameRate { value: String },

    #[error("Invalid merge list token '{token}': {message}")]
    InvalidMergeToken { token: String, message: String },

    #[error("Invalid {preset} level {level} (expected 0-{max})")]
    InvalidPresetLevel {
        preset: &'static str,
        level: u8,
        max: u8,
    },
}

impl From<ModelError> for MarkercutError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::IoError { source, .. } => MarkercutError::Io(source),
            ModelError::ParseError { .. } => MarkercutError::markers(err.to_string()),
            ModelError::InvalidCrop { .. } => MarkercutError::invalid_crop(err.to_string()),
            ModelError::InvalidMergeToken { .. } => MarkercutError::merge_list(err.to_string()),
            ModelError::InvalidFrameRate { .. } | ModelError::InvalidPresetLevel { .. } => {
                MarkercutError::Config {
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_errors_become_config_errors() {
        let err: MarkercutError = ModelError::InvalidPresetLevel {
            preset: "denoise",
            level: 9,
            max: 5,
        }
        .into();
        assert!(
            matches!(&err, MarkercutError::Config { message } if message.contains("denoise level 9"))
        );
        assert!(!err.is_pair_local());

        let err: MarkercutError = ModelError::InvalidCrop {
            crop: "0:0:x:1".to_string(),
            message: "bad width".to_string(),
        }
        .into();
        assert!(err.is_pair_local());
    }
}
