//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while encoding a single file.
///
/// None of these abort a batch; the engine records them as a failed job.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Encoder binary not found.
    #[error("Encoder not found at path: {path}")]
    EncoderNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Source path has no usable file name.
    #[error("Invalid source path: {path}")]
    InvalidSource { path: PathBuf },

    /// Encoder process failed.
    #[error("Encoding failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encode exceeded the per-job timeout.
    #[error("Encoding timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The task running the encode panicked or was aborted.
    #[error("Encoder task failed: {reason}")]
    TaskPanicked { reason: String },

    /// I/O error while encoding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    /// Creates a new encoding failed error with stderr output.
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Full diagnostic text, including captured stderr when there is any.
    pub fn detail(&self) -> String {
        match self {
            Self::Failed {
                stderr: Some(stderr),
                ..
            } if !stderr.is_empty() => format!("{}: {}", self, stderr),
            other => other.to_string(),
        }
    }
}
