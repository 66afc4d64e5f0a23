// Downloader module - selection, fetch and mux pipeline

pub mod directory;
pub mod errors;
pub mod fetcher;
pub mod format_selector;
pub mod models;
pub mod muxer;
pub mod naming;
pub mod orchestrator;
pub mod sources;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use directory::{DirectoryContext, DirectoryPicker};
pub use errors::{DownloadError, ErrorKind, StreamKind};
pub use format_selector::FormatSelector;
pub use models::{
    DownloadMode, DownloadProgress, DownloadReport, DownloadRequest, DownloadState, MediaId,
    MediaItem, NetworkConfig, QualityOptions, Rendition, Thumbnail,
};
pub use muxer::FfmpegMuxer;
pub use orchestrator::DownloadOrchestrator;
pub use sources::YtDlpSource;
pub use traits::{Muxer, ProgressEmitter, VideoSource};
