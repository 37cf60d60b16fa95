//! Camera device driver
//!
//! Frames are synthesized at the configured stream sizes; the video sink
//! writes a Motion-JPEG stream of the frames pulled while recording.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::camera::config::Resolution;
use crate::camera::driver::{CameraDriver, Controls, DriverConfig, EncoderSettings, Frame};
use crate::camera::media::encode_jpeg;
use crate::errors::CamError;

struct VideoSink {
    path: PathBuf,
    file: TokioFile,
    frames: u64,
}

/// Camera device wrapper
pub struct CameraDevice {
    device_path: String,
    sensor: Resolution,
    stream: Option<DriverConfig>,
    streaming: bool,
    is_open: bool,
    controls: Option<Controls>,
    annotation: Option<String>,
    sink: Option<VideoSink>,
    frame_counter: u64,
}

impl CameraDevice {
    /// Open the device node at `device_path`
    pub async fn open(device_path: &str, sensor: Resolution) -> Result<Self, CamError> {
        if !Path::new(device_path).exists() {
            return Err(CamError::DriverError(format!(
                "camera device {} not found",
                device_path
            )));
        }
        info!("Opened camera device {} (sensor {})", device_path, sensor);
        Ok(Self {
            device_path: device_path.to_string(),
            sensor,
            stream: None,
            streaming: false,
            is_open: true,
            controls: None,
            annotation: None,
            sink: None,
            frame_counter: 0,
        })
    }

    /// Check if camera is open
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Get device path
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn ensure_streaming(&self) -> Result<&DriverConfig, CamError> {
        if !self.is_open {
            return Err(CamError::DriverError(format!(
                "camera {} not open",
                self.device_path
            )));
        }
        match &self.stream {
            Some(stream) if self.streaming => Ok(stream),
            _ => Err(CamError::DriverError(format!(
                "camera {} is not streaming",
                self.device_path
            ))),
        }
    }

    fn synthesize(&mut self, size: Resolution) -> Frame {
        self.frame_counter += 1;
        let brightness = self
            .controls
            .as_ref()
            .map(|c| c.brightness)
            .unwrap_or(0.0);
        let offset = (brightness * 64.0) as i32;
        let (width, height) = (size.width.max(1), size.height.max(1));
        let image = RgbImage::from_fn(width, height, |x, y| {
            let r = (x * 255 / width) as i32 + offset;
            let g = (y * 255 / height) as i32 + offset;
            let b = 128 + offset;
            Rgb([clamp_channel(r), clamp_channel(g), clamp_channel(b)])
        });
        Frame::from_image(image)
    }
}

fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[async_trait]
impl CameraDriver for CameraDevice {
    async fn reconfigure(&mut self, config: &DriverConfig) -> Result<(), CamError> {
        if self.streaming {
            return Err(CamError::DriverError(
                "cannot reconfigure while streaming".to_string(),
            ));
        }
        if config.main.width == 0 || config.main.height == 0 {
            return Err(CamError::DriverError(format!(
                "invalid main stream size {}",
                config.main
            )));
        }
        debug!(
            "{}: main {} lores {:?} sensor {} buffers {}",
            self.device_path, config.main, config.lores, config.sensor, config.buffer_count
        );
        self.stream = Some(config.clone());
        Ok(())
    }

    async fn start_stream(&mut self) -> Result<(), CamError> {
        if self.stream.is_none() {
            return Err(CamError::DriverError(format!(
                "camera {} has no stream configuration",
                self.device_path
            )));
        }
        self.streaming = true;
        Ok(())
    }

    async fn stop_stream(&mut self) -> Result<(), CamError> {
        self.streaming = false;
        Ok(())
    }

    async fn capture_still(&mut self) -> Result<Frame, CamError> {
        let size = self.ensure_streaming()?.main;
        Ok(self.synthesize(size))
    }

    async fn capture_video_frame(&mut self) -> Result<Frame, CamError> {
        let stream = self.ensure_streaming()?;
        let size = stream.lores.unwrap_or(stream.main);
        let quality = stream.jpeg_quality;
        let frame = self.synthesize(size);

        if let Some(sink) = self.sink.as_mut() {
            let image = frame.clone().into_image()?;
            let bytes = encode_jpeg(&image, quality)?;
            sink.file.write_all(&bytes).await?;
            sink.frames += 1;
        }
        Ok(frame)
    }

    async fn set_controls(&mut self, controls: &Controls) -> Result<(), CamError> {
        self.controls = Some(controls.clone());
        Ok(())
    }

    async fn start_encoder(&mut self, path: &Path, settings: &EncoderSettings) -> Result<(), CamError> {
        self.ensure_streaming()?;
        if self.sink.is_some() {
            return Err(CamError::DriverError("encoder already running".to_string()));
        }
        let file = TokioFile::create(path).await?;
        debug!(
            "{}: encoding {:?} at {} bps, {} fps",
            self.device_path, path, settings.bitrate, settings.fps
        );
        self.sink = Some(VideoSink {
            path: path.to_path_buf(),
            file,
            frames: 0,
        });
        Ok(())
    }

    async fn stop_encoder(&mut self) -> Result<(), CamError> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };
        sink.file.flush().await?;
        sink.file.sync_all().await?;
        debug!("{}: closed {:?} after {} frames", self.device_path, sink.path, sink.frames);
        Ok(())
    }

    async fn set_annotation(&mut self, text: Option<String>) -> Result<(), CamError> {
        self.annotation = text;
        Ok(())
    }

    fn sensor_resolution(&self) -> Resolution {
        self.sensor
    }

    async fn close(&mut self) -> Result<(), CamError> {
        self.stop_encoder().await?;
        self.streaming = false;
        self.is_open = false;
        Ok(())
    }
}

/// List available camera devices
pub fn list_cameras() -> Vec<String> {
    let mut cameras = Vec::new();

    // Check for V4L2 devices
    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if std::path::Path::new(&path).exists() {
            cameras.push(path);
        }
    }

    cameras
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::config::CameraConfig;
    use crate::filesys::dir::Dir;

    async fn open_temp_device(dir: &Dir) -> CameraDevice {
        let node = dir.path().join("video0");
        dir.file("video0").write_atomic(b"").await.unwrap();
        CameraDevice::open(node.to_str().unwrap(), Resolution::new(64, 48))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_device_fails_to_open() {
        let result = CameraDevice::open("/nonexistent/video9", Resolution::new(64, 48)).await;
        assert!(matches!(result, Err(CamError::DriverError(_))));
    }

    #[tokio::test]
    async fn test_frames_follow_stream_sizes() {
        let dir = Dir::create_temp_dir("camd-device").await.unwrap();
        let mut device = open_temp_device(&dir).await;
        assert!(device.capture_still().await.is_err());

        let mut config = CameraConfig::default();
        config.image = Resolution::new(64, 48);
        config.video = Resolution::new(32, 24);
        device
            .reconfigure(&DriverConfig::from_camera(&config, device.sensor_resolution()))
            .await
            .unwrap();
        device.start_stream().await.unwrap();

        assert_eq!(device.capture_still().await.unwrap().resolution(), Resolution::new(64, 48));
        assert_eq!(
            device.capture_video_frame().await.unwrap().resolution(),
            Resolution::new(32, 24)
        );
        assert!(device.reconfigure(&DriverConfig::from_camera(&config, device.sensor)).await.is_err());

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_encoder_writes_video_frames() {
        let dir = Dir::create_temp_dir("camd-device").await.unwrap();
        let mut device = open_temp_device(&dir).await;
        let config = CameraConfig::default();
        device
            .reconfigure(&DriverConfig::from_camera(&config, Resolution::new(64, 48)))
            .await
            .unwrap();
        device.start_stream().await.unwrap();

        let output = dir.path().join("clip.mp4");
        device
            .start_encoder(&output, &EncoderSettings::from_camera(&config))
            .await
            .unwrap();
        device.capture_video_frame().await.unwrap();
        device.stop_encoder().await.unwrap();
        device.stop_encoder().await.unwrap();

        let size = tokio::fs::metadata(&output).await.unwrap().len();
        assert!(size > 0);

        dir.delete().await.unwrap();
    }
}
