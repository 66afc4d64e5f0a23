// yt-dlp backed VideoSource
//
// Metadata and the rendition catalog come from `yt-dlp --dump-json`;
// the rendition bytes are fetched directly over HTTP from the format URL
// yt-dlp resolved, so the pipeline controls where they are written.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::TryStreamExt;
use regex::Regex;
use tokio_util::io::StreamReader;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{MediaId, MediaItem, NetworkConfig, Rendition, Thumbnail};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::{ByteStream, VideoSource};
use crate::downloader::utils::{
    build_http_client, get_proxy_args, get_timeout_args, run_output_with_timeout, stderr_tail,
};

lazy_static::lazy_static! {
    static ref BARE_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    static ref URL_ID_RE: Regex = Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})"
    ).unwrap();
    static ref QUALITY_NOTE_RE: Regex = Regex::new(r"^\d{3,4}p\d*").unwrap();
}

/// Protocols whose URL is a manifest rather than a plain byte stream
const MANIFEST_PROTOCOLS: &[&str] = &["m3u8", "m3u8_native", "http_dash_segments", "mhtml"];

pub struct YtDlpSource {
    binary: PathBuf,
    network: NetworkConfig,
    client: reqwest::Client,
    /// Seconds allowed for one metadata lookup
    metadata_timeout_secs: u64,
    /// YouTube player client passed to the extractor
    player_client: Option<String>,
}

impl YtDlpSource {
    pub fn new(binary: impl Into<PathBuf>, network: NetworkConfig) -> Result<Self, DownloadError> {
        let client = build_http_client(&network).map_err(DownloadError::SourceUnavailable)?;

        Ok(Self {
            binary: binary.into(),
            network,
            client,
            metadata_timeout_secs: 60,
            player_client: None,
        })
    }

    /// Locate yt-dlp through the tool manager
    pub fn discover(
        manager: &ToolManager,
        configured: Option<&Path>,
        network: NetworkConfig,
    ) -> Result<Self, DownloadError> {
        let binary = manager.locate(ToolType::YtDlp, configured)?;
        tracing::info!("[YtDlp] Using yt-dlp at {}", binary.display());
        Self::new(binary, network)
    }

    pub fn with_metadata_timeout(mut self, secs: u64) -> Self {
        self.metadata_timeout_secs = secs;
        self
    }

    pub fn with_player_client(mut self, client: Option<String>) -> Self {
        self.player_client = client;
        self
    }

    fn build_args(&self, id: &MediaId) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--dump-json".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
        ];

        args.extend(get_timeout_args(&self.network));
        args.extend(get_proxy_args(&self.network));

        if let Some(client) = &self.player_client {
            args.push("--extractor-args".into());
            args.push(format!("youtube:player_client={}", client).into());
        }

        args.push(watch_url(id).into());
        args
    }
}

fn watch_url(id: &MediaId) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Extract the 11-character video id from a URL or a bare id
pub fn extract_video_id(url: &str) -> Result<MediaId, DownloadError> {
    let trimmed = url.trim();

    if BARE_ID_RE.is_match(trimmed) {
        return Ok(MediaId(trimmed.to_string()));
    }

    URL_ID_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| MediaId(m.as_str().to_string()))
        .ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))
}

/// Parse `--dump-json` output into a media item, best rendition first
pub fn parse_media_item(stdout: &[u8]) -> Result<MediaItem, DownloadError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::SourceUnavailable(format!("Invalid JSON: {}", e)))?;

    let formats = json["formats"].as_array().ok_or_else(|| {
        DownloadError::SourceUnavailable("No formats array in JSON".to_string())
    })?;

    // yt-dlp lists formats worst to best
    let renditions: Vec<Rendition> = formats.iter().rev().filter_map(parse_rendition).collect();

    let author = json["uploader"]
        .as_str()
        .or_else(|| json["channel"].as_str())
        .unwrap_or("Unknown");

    Ok(MediaItem {
        id: MediaId(json["id"].as_str().unwrap_or("unknown").to_string()),
        author: author.to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        duration: format_duration(json["duration"].as_f64().unwrap_or(0.0)),
        thumbnails: parse_thumbnails(&json),
        renditions,
    })
}

/// Listed thumbnails in source order, or the single `thumbnail` URL when there is no list
fn parse_thumbnails(json: &serde_json::Value) -> Vec<Thumbnail> {
    let dimension = |t: &serde_json::Value, key: &str| {
        t[key].as_u64().and_then(|v| u32::try_from(v).ok())
    };

    let mut thumbnails: Vec<Thumbnail> = json["thumbnails"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|t| {
                    Some(Thumbnail {
                        url: t["url"].as_str()?.to_string(),
                        width: dimension(t, "width"),
                        height: dimension(t, "height"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if thumbnails.is_empty() {
        if let Some(url) = json["thumbnail"].as_str() {
            thumbnails.push(Thumbnail {
                url: url.to_string(),
                width: None,
                height: None,
            });
        }
    }

    thumbnails
}

fn parse_rendition(f: &serde_json::Value) -> Option<Rendition> {
    let codec = |key: &str| {
        f[key]
            .as_str()
            .filter(|c| !c.is_empty() && *c != "none")
            .map(|c| c.to_string())
    };
    let vcodec = codec("vcodec");
    let acodec = codec("acodec");

    // Storyboards and other image-only entries
    if vcodec.is_none() && acodec.is_none() {
        return None;
    }

    let protocol = f["protocol"].as_str().unwrap_or("https");
    if MANIFEST_PROTOCOLS.contains(&protocol) {
        return None;
    }

    let url = f["url"].as_str()?;
    let ext = f["ext"].as_str().unwrap_or("");
    let note = f["format_note"].as_str().unwrap_or("");

    let quality_label = match &vcodec {
        Some(_) => QUALITY_NOTE_RE
            .find(note)
            .map(|m| m.as_str().to_string())
            .or_else(|| f["height"].as_u64().map(|h| format!("{}p", h)))
            .unwrap_or_default(),
        None => String::new(),
    };

    let audio_quality_label = match &acodec {
        Some(_) => audio_quality(note, f["abr"].as_f64()),
        None => String::new(),
    };

    let family = if vcodec.is_some() { "video" } else { "audio" };
    let subtype = match ext {
        "m4a" | "mp4" => "mp4",
        "weba" | "webm" => "webm",
        other => other,
    };
    let codecs: Vec<String> = vcodec.into_iter().chain(acodec).collect();

    let http_headers: BTreeMap<String, String> = f["http_headers"]
        .as_object()
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let container_mime = format!("{}/{}; codecs=\"{}\"", family, subtype, codecs.join(", "));
    let mut rendition =
        Rendition::new(quality_label, audio_quality_label, container_mime).with_stream_url(url);
    rendition.http_headers = http_headers;

    Some(rendition)
}

/// Map a format note / bitrate to the `AUDIO_QUALITY_*` label family
fn audio_quality(note: &str, abr: Option<f64>) -> String {
    let lead = note.split(',').next().unwrap_or("").trim().to_lowercase();

    let level = match lead.as_str() {
        "ultralow" | "low" | "medium" | "high" => lead.to_uppercase(),
        _ => match abr {
            Some(kbps) if kbps <= 64.0 => "ULTRALOW".to_string(),
            Some(kbps) if kbps <= 96.0 => "LOW".to_string(),
            Some(kbps) if kbps <= 160.0 => "MEDIUM".to_string(),
            Some(_) => "HIGH".to_string(),
            None => "UNKNOWN".to_string(),
        },
    };

    format!("AUDIO_QUALITY_{}", level)
}

/// Render seconds as `1h2m3s` / `4m5s` / `6s`
pub fn format_duration(seconds: f64) -> String {
    let d = time::Duration::seconds(seconds.max(0.0) as i64);
    let (h, m, s) = (
        d.whole_hours(),
        d.whole_minutes() % 60,
        d.whole_seconds() % 60,
    );

    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[async_trait]
impl VideoSource for YtDlpSource {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn resolve_id(&self, url: &str) -> Result<MediaId, DownloadError> {
        extract_video_id(url)
    }

    async fn fetch_item(&self, id: &MediaId) -> Result<MediaItem, DownloadError> {
        let args = self.build_args(id);
        tracing::info!("[YtDlp] Fetching metadata for {}", id);

        let output = run_output_with_timeout(
            self.binary.as_os_str(),
            &args,
            Some(self.metadata_timeout_secs),
        )
        .await
        .map_err(|e| DownloadError::from_source_output(&e))?;

        if !output.status.success() {
            let tail = stderr_tail(&output.stderr, 5);
            tracing::warn!("[YtDlp] Metadata lookup failed: {}", tail);
            return Err(DownloadError::from_source_output(&tail));
        }

        let item = parse_media_item(&output.stdout)?;
        tracing::debug!(
            "[YtDlp] {} renditions for '{}'",
            item.renditions.len(),
            item.title
        );
        Ok(item)
    }

    async fn open_stream(
        &self,
        item: &MediaItem,
        rendition: &Rendition,
    ) -> Result<ByteStream, DownloadError> {
        let url = rendition.stream_url.as_deref().ok_or_else(|| {
            DownloadError::StreamUnavailable(format!(
                "rendition {} of {} has no stream URL",
                rendition.container_mime, item.id
            ))
        })?;

        let mut request = self.client.get(url);
        for (name, value) in &rendition.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DownloadError::StreamUnavailable(e.to_string()))?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }
}
