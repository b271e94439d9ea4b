//! Worker error types.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use reelcut_media::MediaError;
use reelcut_models::ModelError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Input error: {0}")]
    InputError(String),

    #[error("Classification failed: {message}")]
    ClassificationFailed { message: String, status: Option<u16> },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classes used when reporting errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid settings or missing credentials; fails before any work
    Configuration,
    /// A classification call or its result; always recovered locally
    Classification,
    /// Frame extraction or encoding; fatal to the owning job only
    Transcode,
    /// Missing or empty input; fatal to the whole run
    Input,
    Internal,
    Io,
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::InputError(msg.into())
    }

    pub fn classification_failed(msg: impl Into<String>) -> Self {
        Self::ClassificationFailed {
            message: msg.into(),
            status: None,
        }
    }

    pub fn classification_status(status: u16, msg: impl Into<String>) -> Self {
        Self::ClassificationFailed {
            message: msg.into(),
            status: Some(status),
        }
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::ConfigError(_) => ErrorKind::Configuration,
            WorkerError::InputError(_) | WorkerError::Model(_) => ErrorKind::Input,
            WorkerError::ClassificationFailed { .. } => ErrorKind::Classification,
            WorkerError::Media(_) | WorkerError::JobFailed(_) => ErrorKind::Transcode,
            WorkerError::Internal(_) => ErrorKind::Internal,
            WorkerError::Io(_) => ErrorKind::Io,
        }
    }

    /// Structured cause attached to error events.
    pub fn details(&self) -> serde_json::Value {
        match self {
            WorkerError::ClassificationFailed { status, .. } => json!({
                "kind": self.kind(),
                "status": status,
            }),
            WorkerError::Media(MediaError::FfmpegFailed { stderr, exit_code, .. }) => json!({
                "kind": self.kind(),
                "exit_code": exit_code,
                "stderr": stderr,
            }),
            _ => json!({ "kind": self.kind() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(WorkerError::config_error("x").kind(), ErrorKind::Configuration);
        assert_eq!(WorkerError::input_error("x").kind(), ErrorKind::Input);
        assert_eq!(WorkerError::classification_failed("x").kind(), ErrorKind::Classification);
        assert_eq!(
            WorkerError::from(MediaError::FfmpegNotFound).kind(),
            ErrorKind::Transcode
        );
    }

    #[test]
    fn test_ffmpeg_failure_details() {
        let err = WorkerError::from(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("Invalid data found".to_string()),
            Some(1),
        ));
        let details = err.details();
        assert_eq!(details["kind"], "transcode");
        assert_eq!(details["exit_code"], 1);
        assert_eq!(details["stderr"], "Invalid data found");
    }
}
