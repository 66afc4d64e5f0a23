// StreamFetcher - copies one rendition's byte stream to local storage

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::errors::DownloadError;
use super::models::{MediaItem, Rendition};
use super::naming::persist_new;
use super::traits::VideoSource;

pub struct StreamFetcher<'a> {
    source: &'a dyn VideoSource,
}

impl<'a> StreamFetcher<'a> {
    pub fn new(source: &'a dyn VideoSource) -> Self {
        Self { source }
    }

    /// Download `rendition` to `dest`.
    ///
    /// Bytes go to a hidden temp file next to `dest` first and are renamed
    /// into place only after a complete copy, so a failed fetch never leaves
    /// a partial `dest` behind.
    pub async fn fetch_to_path(
        &self,
        item: &MediaItem,
        rendition: &Rendition,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let dir = parent_dir(dest);
        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&dir)
            .map_err(|e| DownloadError::write_failure(&dir, e))?;

        let written = self.copy_into(item, rendition, partial).await?;
        let size = written.bytes;

        persist_new(written.path, dest)?;

        tracing::info!("[Fetcher] Wrote {} bytes to {}", size, dest.display());
        Ok(size)
    }

    /// Download `rendition` into a fresh temp file in `temp_dir`.
    ///
    /// The returned handle deletes the file when dropped.
    pub async fn fetch_to_temp(
        &self,
        item: &MediaItem,
        rendition: &Rendition,
        temp_dir: &Path,
        prefix: &str,
    ) -> Result<TempPath, DownloadError> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(temp_dir)
            .map_err(|e| DownloadError::write_failure(temp_dir, e))?;

        let written = self.copy_into(item, rendition, temp).await?;
        tracing::debug!(
            "[Fetcher] Buffered {} bytes in {}",
            written.bytes,
            written.path.display()
        );

        Ok(written.path)
    }

    async fn copy_into(
        &self,
        item: &MediaItem,
        rendition: &Rendition,
        temp: tempfile::NamedTempFile,
    ) -> Result<Written, DownloadError> {
        // The path handle outlives the file handle and removes the file on any early return
        let (file, path) = temp.into_parts();

        tracing::debug!(
            "[Fetcher] Opening {} stream ({} / {})",
            self.source.name(),
            rendition.container_mime,
            if rendition.quality_label.is_empty() {
                &rendition.audio_quality_label
            } else {
                &rendition.quality_label
            }
        );

        let mut stream = self.source.open_stream(item, rendition).await?;
        let file = tokio::fs::File::from_std(file);

        let bytes = copy_stream(&mut stream, file)
            .await
            .map_err(|e| DownloadError::write_failure(path.to_path_buf(), e))?;

        Ok(Written { path, bytes })
    }
}

struct Written {
    path: TempPath,
    bytes: u64,
}

/// Copy everything from `reader` into `file` and flush it to disk
async fn copy_stream<R>(reader: &mut R, mut file: tokio::fs::File) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(bytes)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
