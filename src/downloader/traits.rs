// Collaborator traits at the edges of the pipeline

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::errors::DownloadError;
use super::models::{DownloadProgress, MediaId, MediaItem, Rendition};

/// Byte stream of one rendition
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Remote metadata and stream resolution
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Name of the source (for logging)
    fn name(&self) -> &'static str;

    /// Extract the media identifier from a URL
    fn resolve_id(&self, url: &str) -> Result<MediaId, DownloadError>;

    /// Fetch metadata and the rendition catalog
    async fn fetch_item(&self, id: &MediaId) -> Result<MediaItem, DownloadError>;

    /// Open the byte stream of one rendition
    async fn open_stream(
        &self,
        item: &MediaItem,
        rendition: &Rendition,
    ) -> Result<ByteStream, DownloadError>;
}

/// Combines a video-only and an audio-only file into one container
#[async_trait]
pub trait Muxer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write the combined file to `output`. Nothing is left at `output` on error.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError>;

    /// Check that the muxer can run at all
    async fn probe(&self) -> bool;
}

/// Receives state transitions of a running download
pub trait ProgressEmitter: Send + Sync {
    fn emit(&self, progress: DownloadProgress);
}
