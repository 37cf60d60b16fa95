//! Stitched still capture across all cameras

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use image::{imageops, RgbImage};
use tracing::{info, warn};

use crate::camera::driver::Frame;
use crate::camera::media;
use crate::camera::session::CameraSession;
use crate::command::action::StitchAxis;
use crate::errors::CamError;
use crate::naming::counters::MediaKind;

/// Capture one frame per camera and store them as a single image.
///
/// Sessions are locked in index order and all captures are started before
/// any is awaited. The output is named with the anchor camera's image
/// template and an index shared by every camera.
pub async fn capture(
    sessions: &[Arc<CameraSession>],
    anchor: usize,
    max_res: bool,
    axis: StitchAxis,
) -> Result<PathBuf, CamError> {
    if anchor >= sessions.len() {
        return Err(CamError::NotFound(format!("camera {}", anchor)));
    }

    let mut guards = Vec::with_capacity(sessions.len());
    for session in sessions {
        guards.push(session.lock().await?);
    }
    for guard in &guards {
        guard.ensure_running()?;
    }

    if max_res {
        let mut entered = 0;
        let mut failure = None;
        for guard in guards.iter_mut() {
            let result = match guard.stop_recording().await {
                Ok(_) => guard.enter_max_resolution().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failure = Some(e);
                break;
            }
            entered += 1;
        }
        if let Some(e) = failure {
            for guard in guards.iter_mut().take(entered) {
                if let Err(restore) = guard.leave_max_resolution().await {
                    warn!("Camera {}: {}", guard.index(), restore);
                }
            }
            return Err(e);
        }
    }
    for guard in guards.iter_mut() {
        guard.set_capturing(true);
    }

    let captured = join_all(guards.iter_mut().map(|guard| guard.capture_frame())).await;

    let mut restore_error = None;
    for guard in guards.iter_mut() {
        if max_res {
            if let Err(e) = guard.leave_max_resolution().await {
                warn!("Camera {}: {}", guard.index(), e);
                restore_error.get_or_insert(e);
            }
        }
        guard.set_capturing(false);
    }

    let frames = captured.into_iter().collect::<Result<Vec<_>, _>>()?;
    if let Some(e) = restore_error {
        return Err(e);
    }
    let combined = combine(frames, axis)?;

    let index = guards
        .iter()
        .map(|guard| guard.next_image_index())
        .max()
        .unwrap_or(1);
    for guard in guards.iter_mut() {
        guard.skip_image_past(index);
    }

    let anchor_session = &guards[anchor];
    let path = anchor_session.image_output_path(index).await?;
    media::ensure_parent(&path).await?;
    media::write_jpeg(&path, combined, anchor_session.config().image_quality).await?;
    anchor_session
        .write_thumbnail(&path, MediaKind::Image, index)
        .await;
    anchor_session
        .schedule_log()
        .record(&format!("Capturing stitched image to {}", path.display()))
        .await;

    info!("Stitched {} cameras into {:?}", guards.len(), path);
    Ok(path)
}

/// Place frames side by side (horizontal) or stacked (vertical), in order.
/// Smaller frames are padded with black.
pub fn combine(frames: Vec<Frame>, axis: StitchAxis) -> Result<RgbImage, CamError> {
    let images = frames
        .into_iter()
        .map(Frame::into_image)
        .collect::<Result<Vec<_>, _>>()?;
    if images.is_empty() {
        return Err(CamError::ValidationError("nothing to stitch".to_string()));
    }

    let (width, height) = match axis {
        StitchAxis::Horizontal => (
            images.iter().map(RgbImage::width).sum(),
            images.iter().map(RgbImage::height).max().unwrap_or(0),
        ),
        StitchAxis::Vertical => (
            images.iter().map(RgbImage::width).max().unwrap_or(0),
            images.iter().map(RgbImage::height).sum(),
        ),
    };

    let mut canvas = RgbImage::new(width, height);
    let mut offset: i64 = 0;
    for image in &images {
        match axis {
            StitchAxis::Horizontal => {
                imageops::replace(&mut canvas, image, offset, 0);
                offset += image.width() as i64;
            }
            StitchAxis::Vertical => {
                imageops::replace(&mut canvas, image, 0, offset);
                offset += image.height() as i64;
            }
        }
    }
    Ok(canvas)
}
