//! Persisted user settings
//!
//! Successful configuration commands are written back to the camera's
//! user config file so they survive a restart of the daemon.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::camera::config::CameraConfig;
use crate::command::parser::CommandCode;
use crate::errors::CamError;
use crate::filesys::file::File;
use crate::storage::config_file::ConfigEntries;

/// The user config file and its current entries
#[derive(Debug, Clone)]
pub struct UserConfig {
    path: PathBuf,
    entries: ConfigEntries,
}

impl UserConfig {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CamError> {
        let path = path.into();
        let entries = ConfigEntries::load(&path).await?;
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &ConfigEntries {
        &self.entries
    }

    /// Re-read the file from disk
    pub async fn reload(&mut self) -> Result<(), CamError> {
        self.entries = ConfigEntries::load(&self.path).await?;
        Ok(())
    }

    /// Record the result of a successful command; returns whether anything changed
    pub async fn persist(
        &mut self,
        command: CommandCode,
        param: &str,
        config: &CameraConfig,
    ) -> Result<bool, CamError> {
        let updates = persisted_entries(command, param, config);
        if updates.is_empty() {
            return Ok(false);
        }
        for (key, value) in &updates {
            self.entries.set(key, value);
        }
        self.save().await?;
        Ok(true)
    }

    /// Back up the file to `.bak` and replace it with the default camera config
    pub async fn reset_from(&mut self, default_file: Option<&Path>) -> Result<(), CamError> {
        let current = File::new(&self.path);
        if current.exists().await {
            let mut backup = self.path.clone().into_os_string();
            backup.push(".bak");
            current.copy_to(Path::new(&backup)).await?;
        }

        let contents = match default_file {
            Some(path) => File::new(path).read_string().await?,
            None => String::new(),
        };
        current.write_atomic(contents.as_bytes()).await?;
        self.entries = ConfigEntries::parse(&contents);
        info!("Reset user config {:?}", self.path);
        Ok(())
    }

    async fn save(&self) -> Result<(), CamError> {
        File::new(&self.path)
            .write_atomic(self.entries.render().as_bytes())
            .await
    }
}

/// Config keys written for a successful command
pub fn persisted_entries(
    command: CommandCode,
    param: &str,
    config: &CameraConfig,
) -> Vec<(&'static str, String)> {
    let trimmed = param.trim();
    let single = |key: &'static str| vec![(key, trimmed.to_string())];
    let positional = |keys: &[&'static str]| {
        keys.iter()
            .zip(trimmed.split_whitespace())
            .map(|(key, value)| (*key, value.to_string()))
            .collect::<Vec<_>>()
    };
    let flag = |on: bool| (if on { "true" } else { "false" }).to_string();

    match command {
        CommandCode::Annotation => vec![("annotation", param.to_string())],
        CommandCode::Sharpness => single("sharpness"),
        CommandCode::Contrast => single("contrast"),
        CommandCode::Brightness => single("brightness"),
        CommandCode::Saturation => single("saturation"),
        CommandCode::ShutterSpeed => single("shutter_speed"),
        CommandCode::ExposureCompensation => single("exposure_compensation"),
        CommandCode::Iso => single("iso"),
        CommandCode::Quality => single("image_quality"),
        CommandCode::Bitrate => single("video_bitrate"),
        CommandCode::MotionMode => single("motion_external"),
        CommandCode::MotionThreshold => single("motion_threshold"),
        CommandCode::MotionDelay => single("motion_initframes"),
        CommandCode::MotionStartFrames => single("motion_startframes"),
        CommandCode::MotionEndFrames => single("motion_stopframes"),
        CommandCode::WhiteBalance => single("white_balance"),
        CommandCode::CameraResolution => single("camera_resolution"),
        CommandCode::ColourGains => positional(&["autowbgain_r", "autowbgain_b"]),
        CommandCode::Pixels => positional(&[
            "video_width",
            "video_height",
            "video_fps",
            "MP4Box_fps",
            "image_width",
            "image_height",
        ]),
        CommandCode::Preview => {
            let mut entries = positional(&["quality", "width", "divider"]);
            entries.push(("height", config.preview.height.to_string()));
            entries
        }
        CommandCode::Flip => {
            let bits = trimmed.parse::<u8>().unwrap_or(0);
            vec![("hflip", flag(bits & 1 != 0)), ("vflip", flag(bits & 2 != 0))]
        }
        CommandCode::DisplayPreview => vec![("show_preview", flag(trimmed != "0"))],
        CommandCode::SoloStream => vec![("solo_stream_mode", flag(trimmed != "0"))],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::dir::Dir;

    #[test]
    fn test_persisted_entries() {
        let mut config = CameraConfig::default();
        assert_eq!(
            persisted_entries(CommandCode::Sharpness, " 40 ", &config),
            vec![("sharpness", "40".to_string())]
        );
        assert_eq!(
            persisted_entries(CommandCode::ColourGains, "150 200", &config),
            vec![
                ("autowbgain_r", "150".to_string()),
                ("autowbgain_b", "200".to_string())
            ]
        );
        config.preview.height = 360;
        assert_eq!(
            persisted_entries(CommandCode::Preview, "60 640 2", &config),
            vec![
                ("quality", "60".to_string()),
                ("width", "640".to_string()),
                ("divider", "2".to_string()),
                ("height", "360".to_string()),
            ]
        );
        assert_eq!(
            persisted_entries(CommandCode::Flip, "1", &config),
            vec![("hflip", "true".to_string()), ("vflip", "false".to_string())]
        );
        assert_eq!(
            persisted_entries(CommandCode::Flip, "2", &config),
            vec![("hflip", "false".to_string()), ("vflip", "true".to_string())]
        );
        assert!(persisted_entries(CommandCode::Image, "", &config).is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_reset() {
        let dir = Dir::create_temp_dir("camd-uconfig").await.unwrap();
        let defaults = dir.file("camd.conf");
        defaults.write_atomic(b"sharpness 0\n").await.unwrap();

        let mut user = UserConfig::load(dir.path().join("uconfig")).await.unwrap();
        assert!(user.entries().is_empty());

        let config = CameraConfig::default();
        assert!(user.persist(CommandCode::Bitrate, "1000", &config).await.unwrap());
        assert!(!user.persist(CommandCode::Image, "", &config).await.unwrap());
        let saved = dir.file("uconfig").read_string().await.unwrap();
        assert_eq!(saved, "video_bitrate 1000\n");

        user.reset_from(Some(defaults.path())).await.unwrap();
        assert_eq!(dir.file("uconfig.bak").read_string().await.unwrap(), saved);
        assert_eq!(dir.file("uconfig").read_string().await.unwrap(), "sharpness 0\n");
        assert_eq!(user.entries().get("sharpness"), Some("0"));

        dir.delete().await.unwrap();
    }
}
