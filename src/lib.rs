pub mod config;
pub mod downloader;
pub mod logging;

pub use config::{ConfigError, DownloaderConfig};
pub use downloader::{
    DirectoryContext, DownloadError, DownloadOrchestrator, DownloadReport, DownloadRequest,
    ErrorKind,
};
