// DownloadOrchestrator - validate, resolve, dispatch by mode, fetch and mux

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DownloaderConfig;

use super::directory::DirectoryContext;
use super::errors::{DownloadError, StreamKind};
use super::fetcher::StreamFetcher;
use super::format_selector::FormatSelector;
use super::models::{
    DownloadMode, DownloadProgress, DownloadReport, DownloadRequest, DownloadState, MediaItem,
    QualityOptions,
};
use super::muxer::{FfmpegMuxer, MuxOptions};
use super::naming::{sanitize_file_stem, unique_file_path};
use super::sources::YtDlpSource;
use super::tools::ToolManager;
use super::traits::{Muxer, ProgressEmitter, VideoSource};

pub struct DownloadOrchestrator {
    source: Arc<dyn VideoSource>,
    muxer: Arc<dyn Muxer>,
    directory: DirectoryContext,
    /// Where combined-mode streams are buffered before muxing
    temp_dir: PathBuf,
    progress: Option<Arc<dyn ProgressEmitter>>,
}

impl DownloadOrchestrator {
    pub fn new(
        source: Arc<dyn VideoSource>,
        muxer: Arc<dyn Muxer>,
        directory: DirectoryContext,
    ) -> Self {
        Self {
            source,
            muxer,
            directory,
            temp_dir: std::env::temp_dir(),
            progress: None,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_progress(mut self, emitter: Arc<dyn ProgressEmitter>) -> Self {
        self.progress = Some(emitter);
        self
    }

    /// Wire yt-dlp and ffmpeg as configured
    pub fn from_config(
        config: &DownloaderConfig,
        directory: DirectoryContext,
    ) -> Result<Self, DownloadError> {
        let mut manager = ToolManager::new();
        if let Some(dir) = &config.tools_dir {
            manager = manager.with_search_dir(dir);
        }

        let source = YtDlpSource::discover(
            &manager,
            config.ytdlp_path.as_deref(),
            config.network.clone(),
        )?
        .with_metadata_timeout(config.metadata_timeout_secs)
        .with_player_client(config.player_client.clone());

        let muxer = FfmpegMuxer::discover(&manager, config.ffmpeg_path.as_deref())?.with_options(
            MuxOptions {
                timeout_secs: config.mux_timeout_secs,
                ..MuxOptions::default()
            },
        );

        Ok(Self::new(Arc::new(source), Arc::new(muxer), directory)
            .with_temp_dir(config.resolved_temp_dir()))
    }

    pub fn directory(&self) -> &DirectoryContext {
        &self.directory
    }

    /// Whether the muxer can run; combined downloads fail without it
    pub async fn muxer_ready(&self) -> bool {
        self.muxer.probe().await
    }

    /// Metadata and rendition catalog for a URL
    pub async fn media_info(&self, url: &str) -> Result<MediaItem, DownloadError> {
        tracing::info!(
            "[Orchestrator] Fetching info via {}: {}",
            self.source.name(),
            url
        );
        let id = self.source.resolve_id(url)?;
        self.source.fetch_item(&id).await
    }

    pub fn quality_options(item: &MediaItem, extension: &str) -> QualityOptions {
        FormatSelector::quality_options(&item.renditions, extension)
    }

    /// Run one request to completion and return the written file
    pub async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        self.emit(DownloadState::Idle, "request received");
        let result = self.run(request).await;

        match &result {
            Ok(path) => {
                tracing::info!("[Orchestrator] Saved {}", path.display());
                self.emit(DownloadState::Done, path.display().to_string());
            }
            Err(e) => {
                tracing::error!("[Orchestrator] Download failed ({:?}): {}", e.kind(), e);
                self.emit(DownloadState::Failed, e.to_string());
            }
        }

        result
    }

    pub async fn download_report(&self, request: &DownloadRequest) -> DownloadReport {
        DownloadReport::from_result(&self.download(request).await)
    }

    async fn run(&self, request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        // Everything here is checked before the source is touched
        let directory = self.directory.ensure_matches(&request.target_directory)?;

        let mode = DownloadMode::of(request);
        if mode == DownloadMode::Invalid {
            return Err(empty_labels());
        }

        let extension = request.normalized_extension();
        if extension.is_empty() {
            return Err(DownloadError::InvalidRequest(
                "no container extension given".to_string(),
            ));
        }

        self.emit(DownloadState::Resolving, request.media_url.clone());
        let item = self.media_info(&request.media_url).await?;
        tracing::info!(
            "[Orchestrator] \"{}\" by {} ({}), {} renditions",
            item.title,
            item.author,
            item.duration,
            item.renditions.len()
        );

        self.emit(DownloadState::ModeDispatch, format!("{:?}", mode));
        let file_name = format!("{}.{}", sanitize_file_stem(&item.title), extension);

        match mode {
            DownloadMode::VideoOnly { quality } => {
                self.emit(DownloadState::VideoOnly, quality.clone());
                self.download_single(
                    &item,
                    StreamKind::Video,
                    &quality,
                    &extension,
                    &directory,
                    &file_name,
                )
                .await
            }
            DownloadMode::AudioOnly { audio_quality } => {
                self.emit(DownloadState::AudioOnly, audio_quality.clone());
                self.download_single(
                    &item,
                    StreamKind::Audio,
                    &audio_quality,
                    &extension,
                    &directory,
                    &file_name,
                )
                .await
            }
            DownloadMode::Combined {
                quality,
                audio_quality,
            } => {
                self.emit(
                    DownloadState::Combined,
                    format!("{} + {}", quality, audio_quality),
                );
                self.download_combined(
                    &item,
                    &quality,
                    &audio_quality,
                    &extension,
                    &directory,
                    &file_name,
                )
                .await
            }
            DownloadMode::Invalid => Err(empty_labels()),
        }
    }

    async fn download_single(
        &self,
        item: &MediaItem,
        kind: StreamKind,
        label: &str,
        extension: &str,
        directory: &Path,
        file_name: &str,
    ) -> Result<PathBuf, DownloadError> {
        let rendition = FormatSelector::select(&item.renditions, kind, label, extension)?;
        tracing::debug!(
            "[Orchestrator] Selected {} rendition {}",
            kind,
            rendition.container_mime
        );

        let dest = unique_file_path(directory, file_name)?;
        StreamFetcher::new(self.source.as_ref())
            .fetch_to_path(item, rendition, &dest)
            .await?;

        Ok(dest)
    }

    async fn download_combined(
        &self,
        item: &MediaItem,
        quality: &str,
        audio_quality: &str,
        extension: &str,
        directory: &Path,
        file_name: &str,
    ) -> Result<PathBuf, DownloadError> {
        // Both selections must succeed before anything is fetched
        let video = FormatSelector::select_video(&item.renditions, quality, extension)?;
        let audio = FormatSelector::select_audio(&item.renditions, audio_quality, extension)?;
        tracing::debug!(
            "[Orchestrator] Selected video {} and audio {} ({})",
            video.container_mime,
            audio.container_mime,
            audio.audio_quality_label
        );

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| DownloadError::write_failure(&self.temp_dir, e))?;

        // Each temp file is owned by its handle and removed when it goes out of scope
        let fetcher = StreamFetcher::new(self.source.as_ref());
        let (video_tmp, audio_tmp) = tokio::try_join!(
            fetcher.fetch_to_temp(item, video, &self.temp_dir, "tmp-video"),
            fetcher.fetch_to_temp(item, audio, &self.temp_dir, "tmp-audio"),
        )?;

        let dest = unique_file_path(directory, file_name)?;
        tracing::info!(
            "[Orchestrator] Muxing with {} into {}",
            self.muxer.name(),
            dest.display()
        );
        self.muxer.mux(&video_tmp, &audio_tmp, &dest).await?;

        Ok(dest)
    }

    fn emit(&self, state: DownloadState, status: impl Into<String>) {
        let status = status.into();
        // Terminal states are logged by `download` with the outcome
        if !state.is_terminal() {
            tracing::info!("[Orchestrator] {:?}: {}", state, status);
        }

        if let Some(emitter) = &self.progress {
            emitter.emit(DownloadProgress { state, status });
        }
    }
}

fn empty_labels() -> DownloadError {
    DownloadError::InvalidRequest("quality and audio quality are both empty".to_string())
}
