//! Text logs read by the web front-end
//!
//! The schedule log shares its file with the front-end's scheduler, which
//! stamps its own lines with `[...]`; the daemon uses `{...}`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::filesys::file::File;

const STAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Per-camera schedule log
#[derive(Debug, Clone)]
pub struct ScheduleLog {
    path: PathBuf,
    enabled: bool,
    camera: usize,
}

impl ScheduleLog {
    /// A `log_size` of 0 disables the log
    pub fn new(path: impl Into<PathBuf>, log_size: u64, camera: usize) -> Self {
        Self {
            path: path.into(),
            enabled: log_size > 0,
            camera,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_line(now: DateTime<Local>, camera: usize, message: &str) -> String {
        format!("{{{}}}{{Camera {}}} {}", now.format(STAMP_FORMAT), camera, message)
    }

    /// Append a line; failures are logged and otherwise ignored
    pub async fn record(&self, message: &str) {
        if !self.enabled {
            return;
        }
        let line = Self::format_line(Local::now(), self.camera, message);
        if let Err(e) = File::new(&self.path).append_line(&line).await {
            warn!("Failed to write schedule log {:?}: {}", self.path, e);
        }
    }
}

/// Motion events recorded in monitor mode
#[derive(Debug, Clone)]
pub struct MotionLog {
    path: PathBuf,
}

impl MotionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn format_line(now: DateTime<Local>, message: &str) -> String {
        format!("{{{}}} {}", now.format(STAMP_FORMAT), message)
    }

    pub async fn record(&self, message: &str) {
        let line = Self::format_line(Local::now(), message);
        if let Err(e) = File::new(&self.path).append_line(&line).await {
            warn!("Failed to write motion log {:?}: {}", self.path, e);
        }
    }
}
