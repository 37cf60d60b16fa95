//! Monitor-mode outputs: motion log lines and the motion pipe flag

use std::path::PathBuf;

use tracing::{info, warn};

use crate::filesys::fifo;
use crate::storage::logbook::MotionLog;

/// Reports detection changes without recording
#[derive(Debug, Clone)]
pub struct MotionMonitor {
    log: MotionLog,
    pipe: Option<PathBuf>,
}

impl MotionMonitor {
    pub fn new(log: MotionLog, pipe: Option<PathBuf>) -> Self {
        Self { log, pipe }
    }

    pub async fn motion_started(&self, camera: usize) {
        info!("Camera {}: motion detected", camera);
        self.log.record(&format!("Camera {} motion start", camera)).await;
        self.signal(b"1");
    }

    pub async fn motion_stopped(&self, camera: usize) {
        info!("Camera {}: motion ended", camera);
        self.log.record(&format!("Camera {} motion stop", camera)).await;
        self.signal(b"0");
    }

    fn signal(&self, flag: &[u8]) {
        let Some(pipe) = &self.pipe else {
            return;
        };
        if let Err(e) = fifo::write_nonblocking(pipe, flag) {
            warn!("Failed to signal motion pipe {:?}: {}", pipe, e);
        }
    }
}
