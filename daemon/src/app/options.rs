//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::camera::session::SessionOptions;
use crate::orchestrator::OrchestratorOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{CameraSettings, Settings};
use crate::workers::{listener, motion, preview, status};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Camera slots, in index order
    pub cameras: Vec<CameraSettings>,

    /// FIFO receiving motion flags in monitor mode
    pub motion_pipe: PathBuf,

    /// Per-camera session options
    pub session: SessionOptions,

    /// Orchestrator options
    pub orchestrator: OrchestratorOptions,

    /// Enable the motion sampling worker
    pub enable_motion_worker: bool,

    /// Enable the preview refresh worker
    pub enable_preview_worker: bool,

    /// Command listener options
    pub listener: listener::Options,

    /// Motion worker options
    pub motion_worker: motion::Options,

    /// Preview worker options
    pub preview_worker: preview::Options,

    /// Status worker options
    pub status_worker: status::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            cameras: Vec::new(),
            motion_pipe: PathBuf::from("/tmp/motionFIFO"),
            session: SessionOptions::default(),
            orchestrator: OrchestratorOptions::default(),
            enable_motion_worker: true,
            enable_preview_worker: true,
            listener: listener::Options::default(),
            motion_worker: motion::Options::default(),
            preview_worker: preview::Options::default(),
            status_worker: status::Options::default(),
        }
    }
}

impl AppOptions {
    /// Options for the daemon described by `settings`
    pub fn from_settings(settings: &Settings, cameras: Vec<CameraSettings>) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: settings.max_shutdown_delay(),
            },
            cameras,
            motion_pipe: settings.motion_pipe.clone(),
            session: SessionOptions {
                restart_timeout: settings.restart_timeout(),
            },
            orchestrator: OrchestratorOptions {
                macros_dir: settings.macros_dir.clone(),
            },
            listener: listener::Options {
                control_file: settings.control_file.clone(),
                status_file: settings.status_file.clone(),
                ..Default::default()
            },
            motion_worker: motion::Options {
                interval: settings.motion_interval(),
            },
            status_worker: status::Options {
                status_file: settings.status_file.clone(),
                interval: settings.status_interval(),
            },
            ..Default::default()
        }
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}
