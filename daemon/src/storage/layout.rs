//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Where the daemon looks for its own files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base configuration directory
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Daemon settings (JSON)
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Camera config used when a camera slot names none
    pub fn default_camera_config(&self) -> File {
        File::new(self.base_dir.join("camd.conf"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/etc/camd")
    }
}
