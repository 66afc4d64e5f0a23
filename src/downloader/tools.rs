// External tool discovery: ffmpeg for muxing, yt-dlp for metadata

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::utils::run_output_with_timeout;

/// Seconds allowed for a `-version` probe
const PROBE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    Ffmpeg,
    YtDlp,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::YtDlp => "yt-dlp",
        }
    }

    pub(crate) fn binary_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
            ToolType::YtDlp => "--version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    /// Extra directories searched before the common install locations
    search_dirs: Vec<PathBuf>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.find(tool_type);
        let version = match &path {
            Some(p) => Self::get_version(p, tool_type).await,
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::Ffmpeg).await,
            self.get_tool_info(ToolType::YtDlp).await,
        ]
    }

    /// Resolve a tool, preferring an explicitly configured path
    pub fn locate(
        &self,
        tool_type: ToolType,
        configured: Option<&Path>,
    ) -> Result<PathBuf, DownloadError> {
        if let Some(path) = configured {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(DownloadError::ToolMissing(format!(
                "{} not found at configured path {}",
                tool_type.as_str(),
                path.display()
            )));
        }

        self.find(tool_type).ok_or_else(|| {
            DownloadError::ToolMissing(format!(
                "{} is not installed or not on PATH",
                tool_type.as_str()
            ))
        })
    }

    fn find(&self, tool_type: ToolType) -> Option<PathBuf> {
        let binary = tool_type.binary_name();

        // 1. Configured search dirs, then common install locations
        let common = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]
            .into_iter()
            .map(PathBuf::from);

        for dir in self.search_dirs.iter().cloned().chain(common) {
            let candidate = dir.join(&binary);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        // 2. PATH
        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var)
            .map(|dir| dir.join(&binary))
            .find(|candidate| candidate.is_file())
    }

    /// First line of the tool's version output, None when it does not run
    pub async fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
        let output = run_output_with_timeout(
            path.as_os_str(),
            &[tool_type.version_arg().into()],
            Some(PROBE_TIMEOUT_SECS),
        )
        .await
        .ok()?;

        if !output.status.success() {
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
    }

    /// Whether the binary at `path` answers a version query
    pub async fn probe(path: &Path, tool_type: ToolType) -> bool {
        Self::get_version(path, tool_type).await.is_some()
    }

    /// Write a bundled tool binary into `dir` and make it executable
    pub fn extract_bundled(
        tool_type: ToolType,
        bytes: &[u8],
        dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let path = dir.join(tool_type.binary_name());

        let write_failed = |e: std::io::Error| {
            DownloadError::ToolMissing(format!("failed to write {}: {}", tool_type.as_str(), e))
        };

        // The handle must be closed before anything executes the file
        let mut file = std::fs::File::create(&path).map_err(write_failed)?;
        file.write_all(bytes).map_err(write_failed)?;
        file.sync_all().map_err(write_failed)?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).map_err(
                |e| DownloadError::ToolMissing(format!("failed to set permissions: {}", e)),
            )?;
        }

        tracing::info!(
            "[ToolManager] Extracted bundled {} to {}",
            tool_type.as_str(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::ErrorKind;
    use crate::downloader::test_utils::process_lock;

    #[test]
    fn test_configured_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("ffmpeg");

        let err = ToolManager::new()
            .locate(ToolType::Ffmpeg, Some(missing.as_path()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolMissing);

        std::fs::write(&missing, b"").unwrap();
        assert_eq!(
            ToolManager::new()
                .locate(ToolType::Ffmpeg, Some(missing.as_path()))
                .unwrap(),
            missing
        );
    }

    #[test]
    fn test_search_dir_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join(ToolType::YtDlp.binary_name());
        std::fs::write(&bin, b"").unwrap();

        let found = ToolManager::new()
            .with_search_dir(dir.path())
            .locate(ToolType::YtDlp, None)
            .unwrap();
        assert_eq!(found, bin);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extracted_tool_reports_version() {
        let _guard = process_lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = b"#!/bin/sh\necho \"ffmpeg version 6.1-test\"\n";

        let path = ToolManager::extract_bundled(ToolType::Ffmpeg, script, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "ffmpeg");

        assert_eq!(
            ToolManager::get_version(&path, ToolType::Ffmpeg)
                .await
                .as_deref(),
            Some("ffmpeg version 6.1-test")
        );
        assert!(ToolManager::probe(&path, ToolType::Ffmpeg).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_is_unusable() {
        let _guard = process_lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = b"#!/bin/sh\nexit 1\n";
        let path = ToolManager::extract_bundled(ToolType::Ffmpeg, script, dir.path()).unwrap();

        assert!(!ToolManager::probe(&path, ToolType::Ffmpeg).await);
        assert!(!ToolManager::probe(&dir.path().join("absent"), ToolType::Ffmpeg).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_all_tools_report_path_and_version() {
        let _guard = process_lock().await;
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = ToolManager::extract_bundled(
            ToolType::Ffmpeg,
            b"#!/bin/sh\necho \"ffmpeg version 7.0-test\"\n",
            dir.path(),
        )
        .unwrap();
        let script = b"#!/bin/sh\necho 2024.08.06\n";
        let ytdlp = ToolManager::extract_bundled(ToolType::YtDlp, script, dir.path()).unwrap();

        let tools = ToolManager::new()
            .with_search_dir(dir.path())
            .get_all_tools()
            .await;

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].tool_type, ToolType::Ffmpeg);
        assert_eq!(tools[0].name, "ffmpeg");
        assert!(tools[0].is_available);
        assert_eq!(tools[0].path.as_deref(), Some(ffmpeg.as_path()));
        assert_eq!(
            tools[0].version.as_deref(),
            Some("ffmpeg version 7.0-test")
        );

        assert_eq!(tools[1].tool_type, ToolType::YtDlp);
        assert_eq!(tools[1].path.as_deref(), Some(ytdlp.as_path()));
        assert_eq!(tools[1].version.as_deref(), Some("2024.08.06"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_tool_is_found_without_version() {
        let _guard = process_lock().await;
        let dir = tempfile::tempdir().unwrap();
        let script = b"#!/bin/sh\nexit 1\n";
        let ffmpeg = ToolManager::extract_bundled(ToolType::Ffmpeg, script, dir.path()).unwrap();

        let info = ToolManager::new()
            .with_search_dir(dir.path())
            .get_tool_info(ToolType::Ffmpeg)
            .await;

        assert!(info.is_available);
        assert_eq!(info.path, Some(ffmpeg));
        assert_eq!(info.version, None);
    }
}
