// Confirmed download directory shared between the picker and downloads

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::errors::DownloadError;

/// Lets the user choose a directory (desktop dialog, CLI prompt, ...)
pub trait DirectoryPicker: Send + Sync {
    /// None when the user cancelled
    fn choose(&self, default_dir: &Path) -> Option<PathBuf>;
}

/// The most recently confirmed target directory.
///
/// Cloning shares the same value.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    current: Arc<RwLock<PathBuf>>,
}

impl DirectoryContext {
    pub fn new(initial: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub fn current(&self) -> PathBuf {
        self.current.read().clone()
    }

    pub fn confirm(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        tracing::info!("[Directory] Confirmed {}", dir.display());
        *self.current.write() = dir;
    }

    /// Ask `picker` for a directory; a cancelled or empty pick keeps the current one
    pub fn choose_with(&self, picker: &dyn DirectoryPicker) -> PathBuf {
        let default_dir = self.current();

        match picker.choose(&default_dir) {
            Some(dir) if !dir.as_os_str().is_empty() => {
                self.confirm(dir.clone());
                dir
            }
            _ => default_dir,
        }
    }

    /// Read the confirmed directory once and check the request agrees with it
    pub fn ensure_matches(&self, requested: &Path) -> Result<PathBuf, DownloadError> {
        let confirmed = self.current();

        if requested == confirmed.as_path() {
            Ok(confirmed)
        } else {
            Err(DownloadError::DirectoryMismatch {
                requested: requested.to_path_buf(),
                confirmed,
            })
        }
    }
}

impl Default for DirectoryContext {
    fn default() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }
}
