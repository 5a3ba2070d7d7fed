use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recording: RecordingConfig,
    pub call: CallConfig,
    pub capture: CaptureConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory recordings are written into.
    /// Defaults to the platform data dir when unset.
    pub directory: Option<PathBuf>,
    /// Executable run after each session (move/upload the artifact).
    /// Env vars: CALLREC_RECORDING_DIR, CALLREC_SESSION_ID,
    /// CALLREC_ARTIFACT_PATH
    pub finalize_command: String,
    /// Timeout in seconds for the finalize command (default: 600)
    pub finalize_timeout_seconds: u64,
    /// Consecutive capture crash-restarts before a session gives up.
    pub max_restarts: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            finalize_command: String::new(),
            finalize_timeout_seconds: 600,
            max_restarts: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Base address of the call service; the session id is appended.
    pub base_url: String,
    /// Browser launched to join the call.
    pub browser_command: String,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            base_url: "https://meet.example.com".to_string(),
            browser_command: "chromium".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub ffmpeg_path: String,
    pub resolution: String,
    pub framerate: u32,
    /// X display grabbed by the capture process.
    pub display: String,
    /// Pulse audio device recorded alongside the display.
    pub audio_device: String,
    /// Seconds the capture process gets to exit after SIGTERM.
    pub stop_grace_seconds: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            resolution: "1920x1080".to_string(),
            framerate: 30,
            display: ":0".to_string(),
            audio_device: "default".to_string(),
            stop_grace_seconds: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3747 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Resolved recording directory: configured path or the platform data
    /// dir fallback.
    pub fn recording_directory(&self) -> Result<PathBuf> {
        match &self.recording.directory {
            Some(dir) => Ok(dir.clone()),
            None => global::recordings_dir(),
        }
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.recording.max_restarts, 5);
        assert_eq!(config.capture.framerate, 30);
        assert_eq!(config.server.port, 3747);
        assert!(config.recording.directory.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [call]
            base_url = "https://calls.internal"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.call.base_url, "https://calls.internal");
        assert_eq!(config.call.browser_command, "chromium");
        assert_eq!(config.capture.ffmpeg_path, "ffmpeg");
    }
}
