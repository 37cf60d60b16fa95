//! Combined preview image

use std::path::PathBuf;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use tracing::{debug, warn};

use crate::camera::driver::Frame;
use crate::camera::media;
use crate::camera::session::CameraSession;
use crate::command::action::StitchAxis;
use crate::errors::CamError;
use crate::orchestrator::stitch::combine;

/// Which cameras made it into a preview refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewReport {
    pub included: Vec<usize>,
    /// Running, preview-enabled cameras left out for a frame height mismatch
    pub excluded: Vec<usize>,
    pub path: Option<PathBuf>,
}

/// Grab a video frame from every running, preview-enabled camera and write
/// them side by side to the primary camera's preview path.
pub async fn refresh(
    sessions: &[Arc<CameraSession>],
    primary: usize,
) -> Result<PreviewReport, CamError> {
    let mut report = PreviewReport::default();
    let mut frames: Vec<Frame> = Vec::new();

    for session in sessions {
        let state = session.state();
        if !state.is_running() || !state.preview_enabled {
            continue;
        }
        let frame = {
            let mut inner = session.lock().await?;
            if let Err(e) = inner.refresh_annotation().await {
                debug!("Camera {}: annotation not updated: {}", session.index(), e);
            }
            match inner.capture_video_frame().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Camera {}: preview frame failed: {}", session.index(), e);
                    continue;
                }
            }
        };

        match frames.first() {
            Some(first) if first.height != frame.height => {
                report.excluded.push(session.index());
            }
            _ => {
                report.included.push(session.index());
                frames.push(frame);
            }
        }
    }

    if frames.is_empty() {
        return Ok(report);
    }

    let config = sessions
        .get(primary)
        .or_else(|| sessions.first())
        .map(|session| session.config())
        .ok_or_else(|| CamError::NotFound("no cameras".to_string()))?;

    let count = frames.len() as u32;
    let combined = combine(frames, StitchAxis::Horizontal)?;
    let width = config.preview.width.max(1) * count;
    let height = config.preview.height.max(1);
    let scaled = if combined.dimensions() == (width, height) {
        combined
    } else {
        imageops::resize(&combined, width, height, FilterType::Triangle)
    };

    media::ensure_parent(&config.preview_path).await?;
    media::write_jpeg(&config.preview_path, scaled, config.preview.quality).await?;
    report.path = Some(config.preview_path.clone());
    Ok(report)
}
