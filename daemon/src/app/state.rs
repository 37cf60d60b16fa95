//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::camera::config::{CameraConfig, Resolution};
use crate::camera::session::{CameraSession, SessionDeps};
use crate::errors::CamError;
use crate::hardware::camera::CameraDevice;
use crate::motion::analyzer::FrameDiffAnalyzer;
use crate::motion::monitor::MotionMonitor;
use crate::orchestrator::Orchestrator;
use crate::status::write_status;
use crate::storage::logbook::MotionLog;

/// Main application state
pub struct AppState {
    /// Daemon version
    pub version: String,

    /// All camera sessions
    pub orchestrator: Arc<Orchestrator>,

    /// Status artifact
    pub status_file: PathBuf,
}

impl AppState {
    /// Open every configured camera; any failure is fatal
    pub async fn init(version: String, options: &AppOptions) -> Result<Self, CamError> {
        info!("Initializing application state...");

        let default_config = options.storage.layout.default_camera_config();
        let mut sessions = Vec::with_capacity(options.cameras.len());

        for (index, camera) in options.cameras.iter().enumerate() {
            let camera_file = match &camera.config_file {
                Some(path) => Some(path.clone()),
                None if default_config.exists().await => Some(default_config.path().to_path_buf()),
                None => None,
            };
            info!(
                "Camera {}: device {} config {:?}",
                index, camera.device, camera_file
            );

            let config = CameraConfig::load_layered(camera_file.as_deref()).await?;
            let device = CameraDevice::open(
                &camera.device,
                Resolution::new(camera.sensor_width, camera.sensor_height),
            )
            .await?;
            let deps = SessionDeps {
                driver: Box::new(device),
                analyzer: Box::new(FrameDiffAnalyzer::new()),
                monitor: MotionMonitor::new(
                    MotionLog::new(&config.motion_logfile),
                    Some(options.motion_pipe.clone()),
                ),
            };
            let session = CameraSession::with_config(
                index,
                config,
                camera_file,
                deps,
                options.session.clone(),
            )
            .await?;
            sessions.push(session);
        }

        let orchestrator = Arc::new(Orchestrator::new(
            sessions,
            options.orchestrator.clone(),
        )?);

        Ok(Self {
            version,
            orchestrator,
            status_file: options.status_worker.status_file.clone(),
        })
    }

    /// Finalize recordings, stop cameras and leave a final status behind
    pub async fn shutdown(&self) -> Result<(), CamError> {
        info!("Shutting down application state...");
        let result = self.orchestrator.shutdown().await;
        if let Err(e) = write_status(&self.status_file, &self.orchestrator).await {
            warn!("Failed to write final status: {}", e);
        }
        result
    }
}
