//! Error types for the cutmark-core library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while resolving, compiling, or processing edit documents.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse edit document {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Video file not found: {0}")]
    VideoNotFound(String),

    #[error("Encoder binary not found: {0}")]
    EncoderMissing(String),

    #[error("Group {group} segment {segment} failed to encode: {message}")]
    SegmentEncode {
        group: u32,
        segment: usize,
        message: String,
    },

    #[error("Concatenation failed for {target}: {message}")]
    Concat { target: String, message: String },

    #[error("Merge output requires a reference resolution")]
    MergePrecondition,

    #[error("Document has no segments assigned to an active group")]
    NoActiveGroups,

    #[error("Invalid scale filter expression: {0}")]
    ScaleExpression(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to start {0}: {1}")]
    CommandStart(String, #[source] std::io::Error),

    #[error("{cmd} exited with code {code:?}: {stderr}")]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Invalid path: {0}")]
    PathError(String),
}

/// Result type for cutmark-core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Builds a `Parse` error for the given document path.
pub(crate) fn parse_error(path: &std::path::Path, reason: impl Into<String>) -> CoreError {
    CoreError::Parse {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Builds a `CommandFailed` error from a finished encoder invocation.
pub(crate) fn command_failed_error(
    cmd: &str,
    code: Option<i32>,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed {
        cmd: cmd.to_string(),
        code,
        stderr: stderr.into(),
    }
}
