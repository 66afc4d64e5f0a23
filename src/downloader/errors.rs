// Error types for the download pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which half of a rendition pair a selection was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DownloadError {
    /// The URL does not contain a recognisable media identifier
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Neither a video nor an audio quality was requested
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Metadata for the media item could not be fetched
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No {kind} rendition matches quality '{label}' with extension '{extension}'")]
    NoMatchingRendition {
        kind: StreamKind,
        label: String,
        extension: String,
    },

    /// The source refused to open the byte stream of a rendition
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("Write failed for {}: {}", .path.display(), .reason)]
    WriteFailure { path: PathBuf, reason: String },

    /// The external muxer could not be launched or exited with an error
    #[error("Mux failed: {0}")]
    MuxFailure(String),

    #[error(
        "Target directory {} does not match the confirmed directory {}",
        .requested.display(),
        .confirmed.display()
    )]
    DirectoryMismatch {
        requested: PathBuf,
        confirmed: PathBuf,
    },

    #[error("Tool not found: {0}")]
    ToolMissing(String),
}

/// Flat error discriminant handed to UI callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    InvalidRequest,
    SourceUnavailable,
    NoMatchingRendition,
    StreamUnavailable,
    WriteFailure,
    MuxFailure,
    DirectoryMismatch,
    ToolMissing,
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Self::NoMatchingRendition { .. } => ErrorKind::NoMatchingRendition,
            Self::StreamUnavailable(_) => ErrorKind::StreamUnavailable,
            Self::WriteFailure { .. } => ErrorKind::WriteFailure,
            Self::MuxFailure(_) => ErrorKind::MuxFailure,
            Self::DirectoryMismatch { .. } => ErrorKind::DirectoryMismatch,
            Self::ToolMissing(_) => ErrorKind::ToolMissing,
        }
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::WriteFailure {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Classify the stderr of a failed metadata lookup
    pub fn from_source_output(s: &str) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("unsupported url")
            || lower.contains("is not a valid url")
            || lower.contains("incomplete youtube id")
            || lower.contains("invalid url")
        {
            return Self::InvalidUrl(s.trim().to_string());
        }

        if lower.contains("command not found") || lower.contains("no such file") {
            return Self::ToolMissing(s.trim().to_string());
        }

        // Timeouts, 403/429, private or removed videos all end up here
        Self::SourceUnavailable(s.trim().to_string())
    }
}
