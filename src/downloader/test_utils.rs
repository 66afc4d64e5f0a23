// In-memory collaborators for pipeline tests

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::io::StreamReader;

use super::errors::DownloadError;
use super::models::{DownloadProgress, DownloadState, MediaId, MediaItem, Rendition};
use super::traits::{ByteStream, Muxer, ProgressEmitter, VideoSource};

/// Macro to initialize tracing for tests
#[macro_export]
macro_rules! init_test_tracing {
    () => {
        $crate::init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

static PROCESS_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Held by every test that writes an executable or spawns a process.
///
/// A child forked while another test still has its script open for writing
/// keeps that descriptor, and exec of the script then fails with ETXTBSY.
pub async fn process_lock() -> tokio::sync::MutexGuard<'static, ()> {
    PROCESS_LOCK.lock().await
}

pub fn sample_item() -> MediaItem {
    MediaItem {
        id: MediaId("abcdefghijk".to_string()),
        author: "Sample Channel".to_string(),
        title: "Sample Clip".to_string(),
        duration: "3m33s".to_string(),
        thumbnails: Vec::new(),
        renditions: vec![
            Rendition::new("1080p", "", "video/mp4; codecs=\"avc1.640028\""),
            Rendition::new(
                "",
                "AUDIO_QUALITY_MEDIUM",
                "audio/mp4; codecs=\"mp4a.40.2\"",
            ),
            Rendition::new("720p", "", "video/mp4; codecs=\"avc1.4d401f\""),
            Rendition::new("720p", "", "video/webm; codecs=\"vp9\""),
            Rendition::new("", "AUDIO_QUALITY_LOW", "audio/webm; codecs=\"opus\""),
        ],
    }
}

fn key(r: &Rendition) -> String {
    format!(
        "{}|{}|{}",
        r.quality_label, r.audio_quality_label, r.container_mime
    )
}

/// Serves a fixed item and deterministic payloads, counting every call
pub struct MemorySource {
    item: MediaItem,
    failing: HashSet<String>,
    broken: HashSet<String>,
    fail_fetch: bool,
    pub resolve_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(item: MediaItem) -> Self {
        Self {
            item,
            failing: HashSet::new(),
            broken: HashSet::new(),
            fail_fetch: false,
            resolve_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }

    /// `open_stream` refuses this rendition
    pub fn fail_stream(mut self, rendition: &Rendition) -> Self {
        self.failing.insert(key(rendition));
        self
    }

    /// The stream of this rendition errors after a few bytes
    pub fn break_stream(mut self, rendition: &Rendition) -> Self {
        self.broken.insert(key(rendition));
        self
    }

    pub fn fail_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn payload(rendition: &Rendition) -> Vec<u8> {
        key(rendition).repeat(64).into_bytes()
    }

    pub fn total_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
            + self.fetch_calls.load(Ordering::SeqCst)
            + self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn resolve_id(&self, url: &str) -> Result<MediaId, DownloadError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if url.starts_with("https://") {
            Ok(self.item.id.clone())
        } else {
            Err(DownloadError::InvalidUrl(url.to_string()))
        }
    }

    async fn fetch_item(&self, _id: &MediaId) -> Result<MediaItem, DownloadError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(DownloadError::SourceUnavailable("HTTP Error 503".to_string()));
        }
        Ok(self.item.clone())
    }

    async fn open_stream(
        &self,
        _item: &MediaItem,
        rendition: &Rendition,
    ) -> Result<ByteStream, DownloadError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let k = key(rendition);

        if self.failing.contains(&k) {
            return Err(DownloadError::StreamUnavailable(format!("403 for {}", k)));
        }

        let payload = Self::payload(rendition);
        let mut chunks: Vec<std::io::Result<std::io::Cursor<Vec<u8>>>> =
            vec![Ok(std::io::Cursor::new(payload[..16].to_vec()))];

        if self.broken.contains(&k) {
            chunks.push(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        } else {
            chunks.push(Ok(std::io::Cursor::new(payload[16..].to_vec())));
        }

        Ok(Box::new(StreamReader::new(futures::stream::iter(chunks))))
    }
}

/// Muxer that concatenates its inputs, or fails without writing anything
pub struct ScriptedMuxer {
    fail: bool,
    pub calls: AtomicUsize,
    /// Whether both inputs existed when `mux` ran
    pub inputs_present: Mutex<Vec<bool>>,
}

impl ScriptedMuxer {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
            inputs_present: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }
}

#[async_trait]
impl Muxer for ScriptedMuxer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs_present
            .lock()
            .push(video.is_file() && audio.is_file());

        if self.fail {
            return Err(DownloadError::MuxFailure("exit status: 1".to_string()));
        }

        let mut combined = read_input(video)?;
        combined.extend(read_input(audio)?);
        std::fs::write(output, combined).map_err(|e| DownloadError::write_failure(output, e))
    }

    async fn probe(&self) -> bool {
        !self.fail
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, DownloadError> {
    std::fs::read(path).map_err(|e| DownloadError::MuxFailure(e.to_string()))
}

/// Records every state the orchestrator reports
#[derive(Default)]
pub struct RecordingEmitter {
    pub states: Mutex<Vec<DownloadState>>,
}

impl RecordingEmitter {
    pub fn states(&self) -> Vec<DownloadState> {
        self.states.lock().clone()
    }
}

impl ProgressEmitter for RecordingEmitter {
    fn emit(&self, progress: DownloadProgress) {
        self.states.lock().push(progress.state);
    }
}
