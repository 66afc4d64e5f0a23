// ffmpeg-backed audio/video muxing

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::DownloadError;
use super::naming::persist_new;
use super::tools::{ToolManager, ToolType};
use super::traits::Muxer;
use super::utils::{run_output_with_timeout, stderr_tail};

/// Options for the ffmpeg invocation
#[derive(Debug, Clone)]
pub struct MuxOptions {
    /// Video codec, "copy" keeps the stream untouched
    pub video_codec: String,
    /// Audio codec for the output container
    pub audio_codec: String,
    /// Kill ffmpeg after this many seconds (None = no limit)
    pub timeout_secs: Option<u64>,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self {
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            timeout_secs: None,
        }
    }
}

pub struct FfmpegMuxer {
    binary: PathBuf,
    options: MuxOptions,
}

impl FfmpegMuxer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            options: MuxOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MuxOptions) -> Self {
        self.options = options;
        self
    }

    /// Locate ffmpeg through the tool manager
    pub fn discover(
        manager: &ToolManager,
        configured: Option<&Path>,
    ) -> Result<Self, DownloadError> {
        let binary = manager.locate(ToolType::Ffmpeg, configured)?;
        tracing::info!("[Muxer] Using ffmpeg at {}", binary.display());
        Ok(Self::new(binary))
    }

    fn build_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        vec![
            // The temp output already exists
            "-y".into(),
            "-i".into(),
            video.into(),
            "-i".into(),
            audio.into(),
            "-c:v".into(),
            self.options.video_codec.as_str().into(),
            "-c:a".into(),
            self.options.audio_codec.as_str().into(),
            output.into(),
        ]
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // ffmpeg picks the container from the extension
        let suffix = output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let staging = tempfile::Builder::new()
            .prefix(".mux-")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(|e| DownloadError::write_failure(&dir, e))?
            .into_temp_path();

        let args = self.build_args(video, audio, &staging);
        tracing::info!(
            "[Muxer] Running {} for {}",
            self.binary.display(),
            output.display()
        );
        tracing::debug!("[Muxer] Args: {:?}", args);

        let result =
            run_output_with_timeout(self.binary.as_os_str(), &args, self.options.timeout_secs)
                .await
                .map_err(DownloadError::MuxFailure)?;

        if !result.status.success() {
            let tail = stderr_tail(&result.stderr, 5);
            tracing::error!("[Muxer] ffmpeg exited with {}: {}", result.status, tail);
            return Err(DownloadError::MuxFailure(format!(
                "ffmpeg exited with {}: {}",
                result.status, tail
            )));
        }

        let size = std::fs::metadata(&staging).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(DownloadError::MuxFailure(
                "ffmpeg reported success but produced an empty file".to_string(),
            ));
        }

        persist_new(staging, output)?;

        tracing::info!("[Muxer] Wrote {} bytes to {}", size, output.display());
        Ok(())
    }

    async fn probe(&self) -> bool {
        ToolManager::probe(&self.binary, ToolType::Ffmpeg).await
    }
}
