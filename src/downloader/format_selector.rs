// FormatSelector - rendition matching by quality label and container
//
// Selection never re-orders the catalog: the first rendition that
// satisfies the predicate wins, so a fixed catalog always yields the
// same pick.

use super::errors::{DownloadError, StreamKind};
use super::models::{normalize_extension, QualityOptions, Rendition};

/// Audio label meaning "any audio-capable rendition"
pub const ANY_AUDIO_QUALITY: &str = "*";

pub struct FormatSelector;

impl FormatSelector {
    /// First rendition with the exact video quality in `video/<ext>`
    pub fn select_video<'a>(
        renditions: &'a [Rendition],
        quality: &str,
        extension: &str,
    ) -> Result<&'a Rendition, DownloadError> {
        let family = Self::family(StreamKind::Video, extension);

        renditions
            .iter()
            .find(|r| r.quality_label == quality && r.mime_essence() == family)
            .ok_or_else(|| DownloadError::NoMatchingRendition {
                kind: StreamKind::Video,
                label: quality.to_string(),
                extension: normalize_extension(extension),
            })
    }

    /// First audio-capable rendition with the audio quality in `audio/<ext>`.
    /// An empty or `*` label accepts any audio quality.
    pub fn select_audio<'a>(
        renditions: &'a [Rendition],
        audio_quality: &str,
        extension: &str,
    ) -> Result<&'a Rendition, DownloadError> {
        let family = Self::family(StreamKind::Audio, extension);
        let wildcard = audio_quality.is_empty() || audio_quality == ANY_AUDIO_QUALITY;

        renditions
            .iter()
            .filter(|r| r.is_audio_capable())
            .find(|r| {
                (wildcard || r.audio_quality_label == audio_quality) && r.mime_essence() == family
            })
            .ok_or_else(|| DownloadError::NoMatchingRendition {
                kind: StreamKind::Audio,
                label: audio_quality.to_string(),
                extension: normalize_extension(extension),
            })
    }

    pub fn select<'a>(
        renditions: &'a [Rendition],
        kind: StreamKind,
        label: &str,
        extension: &str,
    ) -> Result<&'a Rendition, DownloadError> {
        match kind {
            StreamKind::Video => Self::select_video(renditions, label, extension),
            StreamKind::Audio => Self::select_audio(renditions, label, extension),
        }
    }

    /// Distinct quality labels a UI can offer for `extension`, in catalog order
    pub fn quality_options(renditions: &[Rendition], extension: &str) -> QualityOptions {
        let video_family = Self::family(StreamKind::Video, extension);
        let audio_family = Self::family(StreamKind::Audio, extension);

        let mut options = QualityOptions {
            extension: normalize_extension(extension),
            ..Default::default()
        };

        for r in renditions {
            let essence = r.mime_essence();

            if essence == video_family
                && !r.quality_label.is_empty()
                && !options.video.contains(&r.quality_label)
            {
                options.video.push(r.quality_label.clone());
            }

            if essence == audio_family
                && r.is_audio_capable()
                && !options.audio.contains(&r.audio_quality_label)
            {
                options.audio.push(r.audio_quality_label.clone());
            }
        }

        options
    }

    /// Mime essence of the container family (`video/mp4`, `audio/webm`)
    fn family(kind: StreamKind, extension: &str) -> String {
        format!("{}/{}", kind, normalize_extension(extension))
    }
}
