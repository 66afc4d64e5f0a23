// Downloader configuration: tool paths, directories, network and timeouts

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::downloader::models::NetworkConfig;

pub const ENV_FFMPEG: &str = "MEDIA_DL_FFMPEG";
pub const ENV_YTDLP: &str = "MEDIA_DL_YTDLP";
pub const ENV_PROXY: &str = "MEDIA_DL_PROXY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Explicit ffmpeg binary; searched for when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit yt-dlp binary; searched for when unset
    pub ytdlp_path: Option<PathBuf>,
    /// Extra directory searched for both tools (bundled binaries)
    pub tools_dir: Option<PathBuf>,
    /// Buffer directory for combined downloads, system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    pub default_directory: PathBuf,
    pub network: NetworkConfig,
    pub metadata_timeout_secs: u64,
    pub mux_timeout_secs: Option<u64>,
    pub player_client: Option<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ytdlp_path: None,
            tools_dir: None,
            temp_dir: None,
            default_directory: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            network: NetworkConfig::default(),
            metadata_timeout_secs: 60,
            mux_timeout_secs: None,
            player_client: None,
        }
    }
}

impl DownloaderConfig {
    /// Read a JSON config; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup(ENV_FFMPEG) {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_YTDLP) {
            self.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Some(proxy) = lookup(ENV_PROXY) {
            tracing::info!("[Config] Proxy from {}", ENV_PROXY);
            self.network.proxy = Some(proxy);
        }

        self
    }

    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{
            "ffmpeg_path": "/opt/ffmpeg",
            "network": { "proxy": "socks5://127.0.0.1:1080" }
        }"#;
        std::fs::write(&path, json).unwrap();

        let config = DownloaderConfig::load(&path).unwrap();

        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
        assert_eq!(
            config.network.proxy.as_deref(),
            Some("socks5://127.0.0.1:1080")
        );
        assert_eq!(config.network.timeout, Some(30));
        assert_eq!(config.metadata_timeout_secs, 60);
        assert!(config.ytdlp_path.is_none());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = DownloaderConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let broken = DownloaderConfig::load(&path).unwrap_err();
        assert!(matches!(broken, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides_replace_set_values_only() {
        let config = DownloaderConfig {
            ytdlp_path: Some(PathBuf::from("/usr/bin/yt-dlp")),
            ..Default::default()
        }
        .with_overrides_from(|key| match key {
            ENV_FFMPEG => Some("/custom/ffmpeg".to_string()),
            ENV_YTDLP => Some("  ".to_string()),
            ENV_PROXY => Some("http://proxy:8080".to_string()),
            _ => None,
        });

        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/custom/ffmpeg")));
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/usr/bin/yt-dlp")));
        assert_eq!(config.network.proxy.as_deref(), Some("http://proxy:8080"));
    }

    #[test]
    fn test_temp_dir_falls_back_to_system() {
        let mut config = DownloaderConfig::default();
        assert_eq!(config.resolved_temp_dir(), std::env::temp_dir());

        config.temp_dir = Some(PathBuf::from("/var/tmp/media"));
        assert_eq!(config.resolved_temp_dir(), PathBuf::from("/var/tmp/media"));
    }
}
