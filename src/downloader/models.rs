// Common data models for the download pipeline

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::{DownloadError, ErrorKind};

/// Identifier of a media item as understood by a `VideoSource`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub String);

impl MediaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One encoded variant of a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    /// Video quality (e.g. "720p"), empty for audio-only streams
    pub quality_label: String,
    /// Audio quality (e.g. "AUDIO_QUALITY_MEDIUM"), empty when there is no audio
    pub audio_quality_label: String,
    /// Mime type with codecs (e.g. `video/mp4; codecs="avc1.4d401f"`)
    pub container_mime: String,
    /// Direct stream location, when the source resolves one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Request headers the stream location expects
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub http_headers: BTreeMap<String, String>,
}

impl Rendition {
    pub fn new(
        quality_label: impl Into<String>,
        audio_quality_label: impl Into<String>,
        container_mime: impl Into<String>,
    ) -> Self {
        Self {
            quality_label: quality_label.into(),
            audio_quality_label: audio_quality_label.into(),
            container_mime: container_mime.into(),
            stream_url: None,
            http_headers: BTreeMap::new(),
        }
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    /// Renditions with an audio quality label carry an audio track
    pub fn is_audio_capable(&self) -> bool {
        !self.audio_quality_label.is_empty()
    }

    /// Mime type without parameters, lowercased (`video/mp4`)
    pub fn mime_essence(&self) -> String {
        self.container_mime
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }
}

/// Preview image; dimensions are missing for some sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Metadata of one media item plus its rendition catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub author: String,
    pub title: String,
    pub duration: String,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
    /// Ordered by the source's quality ranking; never re-sorted here
    pub renditions: Vec<Rendition>,
}

/// A single download as requested by the UI layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub target_directory: PathBuf,
    pub media_url: String,
    /// Empty for audio-only downloads
    #[serde(default)]
    pub quality_label: String,
    /// Empty for video-only downloads
    #[serde(default)]
    pub audio_quality_label: String,
    pub extension: String,
}

impl DownloadRequest {
    pub fn new(
        target_directory: impl Into<PathBuf>,
        media_url: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            target_directory: target_directory.into(),
            media_url: media_url.into(),
            extension: extension.into(),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality_label = quality.into();
        self
    }

    pub fn with_audio_quality(mut self, audio_quality: impl Into<String>) -> Self {
        self.audio_quality_label = audio_quality.into();
        self
    }

    /// Extension without leading dot, lowercased
    pub fn normalized_extension(&self) -> String {
        normalize_extension(&self.extension)
    }
}

pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// What a request asks for, decided once from its two quality labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadMode {
    VideoOnly { quality: String },
    AudioOnly { audio_quality: String },
    Combined {
        quality: String,
        audio_quality: String,
    },
    Invalid,
}

impl DownloadMode {
    pub fn classify(quality: &str, audio_quality: &str) -> Self {
        match (quality.is_empty(), audio_quality.is_empty()) {
            (false, true) => Self::VideoOnly {
                quality: quality.to_string(),
            },
            (true, false) => Self::AudioOnly {
                audio_quality: audio_quality.to_string(),
            },
            (false, false) => Self::Combined {
                quality: quality.to_string(),
                audio_quality: audio_quality.to_string(),
            },
            (true, true) => Self::Invalid,
        }
    }

    pub fn of(request: &DownloadRequest) -> Self {
        Self::classify(&request.quality_label, &request.audio_quality_label)
    }
}

/// Pipeline states reported while a download runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    Idle,
    Resolving,
    ModeDispatch,
    VideoOnly,
    AudioOnly,
    Combined,
    Done,
    Failed,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Download progress information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub state: DownloadState,
    pub status: String,
}

/// Outcome of a download in the shape the UI consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
}

impl DownloadReport {
    pub fn from_result(result: &Result<PathBuf, DownloadError>) -> Self {
        match result {
            Ok(path) => Self {
                success: true,
                output_path: Some(path.clone()),
                error_kind: None,
                message: None,
            },
            Err(e) => Self {
                success: false,
                output_path: None,
                error_kind: Some(e.kind()),
                message: Some(e.to_string()),
            },
        }
    }
}

/// Quality labels offered for one container extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOptions {
    pub extension: String,
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

/// Network configuration for sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Connect / socket timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_classification() {
        assert_eq!(
            DownloadMode::classify("720p", ""),
            DownloadMode::VideoOnly {
                quality: "720p".to_string()
            }
        );
        assert_eq!(
            DownloadMode::classify("", "AUDIO_QUALITY_LOW"),
            DownloadMode::AudioOnly {
                audio_quality: "AUDIO_QUALITY_LOW".to_string()
            }
        );
        assert_eq!(
            DownloadMode::classify("1080p", "AUDIO_QUALITY_MEDIUM"),
            DownloadMode::Combined {
                quality: "1080p".to_string(),
                audio_quality: "AUDIO_QUALITY_MEDIUM".to_string()
            }
        );
        assert_eq!(DownloadMode::classify("", ""), DownloadMode::Invalid);
    }

    #[test]
    fn test_only_done_and_failed_are_terminal() {
        assert!(DownloadState::Done.is_terminal());
        assert!(DownloadState::Failed.is_terminal());
        assert!(!DownloadState::Idle.is_terminal());
        assert!(!DownloadState::Combined.is_terminal());
    }

    #[test]
    fn test_mime_essence_strips_codecs() {
        let r = Rendition::new("720p", "", "Video/MP4; codecs=\"avc1.4d401f\"");
        assert_eq!(r.mime_essence(), "video/mp4");
        assert!(!r.is_audio_capable());
    }

    #[test]
    fn test_report_carries_error_kind() {
        let failed: Result<PathBuf, DownloadError> =
            Err(DownloadError::MuxFailure("exit status 1".to_string()));
        let report = DownloadReport::from_result(&failed);
        assert!(!report.success);
        assert_eq!(report.error_kind, Some(ErrorKind::MuxFailure));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error_kind"], "mux_failure");
    }

    #[test]
    fn test_extension_normalization() {
        let req = DownloadRequest::new("/tmp", "https://youtu.be/x", ".MP4");
        assert_eq!(req.normalized_extension(), "mp4");
    }
}
