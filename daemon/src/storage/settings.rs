//! Daemon settings file

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::CamError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Daemon-wide settings, read from a JSON file at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory for daily-rolling log files, none to log to stdout only
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Command channel FIFO
    #[serde(default = "default_control_file")]
    pub control_file: PathBuf,

    /// FIFO receiving motion flags in monitor mode
    #[serde(default = "default_motion_pipe")]
    pub motion_pipe: PathBuf,

    /// Status artifact
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,

    /// Directory of `sy` macro scripts
    #[serde(default = "default_macros_dir")]
    pub macros_dir: PathBuf,

    /// Upper bound on waiting for a camera and on restart transactions
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout_secs: u64,

    /// Periodic status rewrite interval
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,

    /// Motion analysis frame interval
    #[serde(default = "default_motion_interval")]
    pub motion_interval_ms: u64,

    /// Maximum time allowed for graceful shutdown
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,

    /// Cameras in slot order; empty to auto-detect
    #[serde(default)]
    pub cameras: Vec<CameraSettings>,
}

fn default_control_file() -> PathBuf {
    PathBuf::from("/tmp/FIFO")
}

fn default_motion_pipe() -> PathBuf {
    PathBuf::from("/tmp/motionFIFO")
}

fn default_status_file() -> PathBuf {
    PathBuf::from("/tmp/status_mjpeg.txt")
}

fn default_macros_dir() -> PathBuf {
    PathBuf::from("/var/www/html/macros")
}

fn default_restart_timeout() -> u64 {
    10
}

fn default_status_interval() -> u64 {
    1000
}

fn default_motion_interval() -> u64 {
    100
}

fn default_max_shutdown_delay() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            control_file: default_control_file(),
            motion_pipe: default_motion_pipe(),
            status_file: default_status_file(),
            macros_dir: default_macros_dir(),
            restart_timeout_secs: default_restart_timeout(),
            status_interval_ms: default_status_interval(),
            motion_interval_ms: default_motion_interval(),
            max_shutdown_delay_secs: default_max_shutdown_delay(),
            cameras: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings from `path`; a missing file yields the defaults
    pub async fn load(path: &Path) -> Result<Self, CamError> {
        let file = File::new(path);
        if !file.exists().await {
            info!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn motion_interval(&self) -> Duration {
        Duration::from_millis(self.motion_interval_ms)
    }

    pub fn max_shutdown_delay(&self) -> Duration {
        Duration::from_secs(self.max_shutdown_delay_secs)
    }
}

/// One camera slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Device node, e.g. `/dev/video0`
    pub device: String,

    /// Camera config file layered over the built-in defaults
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// Largest sensor mode
    #[serde(default = "default_sensor_width")]
    pub sensor_width: u32,

    #[serde(default = "default_sensor_height")]
    pub sensor_height: u32,
}

fn default_sensor_width() -> u32 {
    1920
}

fn default_sensor_height() -> u32 {
    1080
}

impl CameraSettings {
    pub fn for_device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            config_file: None,
            sensor_width: default_sensor_width(),
            sensor_height: default_sensor_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let settings: Settings = serde_json::from_str(
            r#"{"log_level": "debug", "cameras": [{"device": "/dev/video2"}]}"#,
        )
        .unwrap();
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.control_file, PathBuf::from("/tmp/FIFO"));
        assert_eq!(settings.restart_timeout(), Duration::from_secs(10));
        assert_eq!(settings.cameras.len(), 1);
        assert_eq!(settings.cameras[0].sensor_width, 1920);
        assert!(settings.cameras[0].config_file.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed() {
        let dir = crate::filesys::dir::Dir::create_temp_dir("camd-settings")
            .await
            .unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(settings.status_file, PathBuf::from("/tmp/status_mjpeg.txt"));

        dir.file("bad.json").write_atomic(b"{ not json").await.unwrap();
        assert!(Settings::load(&dir.path().join("bad.json")).await.is_err());

        dir.delete().await.unwrap();
    }
}
