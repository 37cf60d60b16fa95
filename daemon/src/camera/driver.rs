//! Camera driver and motion analyzer interfaces
//!
//! The session talks to hardware only through [`CameraDriver`]. Frames are
//! packed 8-bit RGB.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;

use crate::camera::config::{CameraConfig, Resolution, WhiteBalance};
use crate::errors::CamError;

/// One captured RGB frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// All-black frame
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 3],
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn into_image(self) -> Result<RgbImage, CamError> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.data).ok_or_else(|| {
            CamError::DriverError(format!("frame buffer does not match {}x{}", width, height))
        })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
        }
    }
}

/// Stream layout handed to the driver on every reconfigure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Still/main stream
    pub main: Resolution,
    /// Video and preview stream, absent in solo-stream mode
    pub lores: Option<Resolution>,
    /// Sensor mode
    pub sensor: Resolution,
    pub buffer_count: u32,
    pub hflip: bool,
    pub vflip: bool,
    pub jpeg_quality: u8,
}

impl DriverConfig {
    /// Derive the stream layout; main is clamped to the sensor maximum and
    /// lores to main
    pub fn from_camera(config: &CameraConfig, sensor_max: Resolution) -> Self {
        let main = config.image.clamp_to(sensor_max);
        let solo = config.solo_stream.is_on();
        Self {
            main,
            lores: (!solo).then(|| config.video.clamp_to(main)),
            sensor: config.sensor_format,
            buffer_count: if solo { 1 } else { config.buffer_count.max(1) },
            hflip: config.hflip,
            vflip: config.vflip,
            jpeg_quality: config.image_quality,
        }
    }

    /// Single stream at the sensor maximum for one still capture
    pub fn max_resolution(config: &CameraConfig, sensor_max: Resolution) -> Self {
        Self {
            main: sensor_max,
            lores: None,
            sensor: sensor_max,
            buffer_count: 1,
            hflip: config.hflip,
            vflip: config.vflip,
            jpeg_quality: config.image_quality,
        }
    }
}

/// Image controls that can change while streaming
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub sharpness: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub exposure_compensation: f64,
    pub analogue_gain: f64,
    pub white_balance: WhiteBalance,
    pub colour_gains: (f64, f64),
    pub exposure_time: u64,
    pub frame_rate: u32,
}

impl Controls {
    pub fn from_camera(config: &CameraConfig) -> Self {
        Self {
            sharpness: config.sharpness,
            contrast: config.contrast,
            brightness: config.brightness,
            saturation: config.saturation,
            exposure_compensation: config.exposure_compensation,
            analogue_gain: config.analogue_gain,
            white_balance: config.white_balance,
            colour_gains: config.colour_gains,
            exposure_time: config.exposure_time,
            frame_rate: config.video_fps,
        }
    }
}

/// Video encoder parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub bitrate: u32,
    pub fps: u32,
}

impl EncoderSettings {
    pub fn from_camera(config: &CameraConfig) -> Self {
        Self {
            bitrate: config.video_bitrate,
            fps: config.mp4_fps,
        }
    }
}

/// Low-level camera access
#[async_trait]
pub trait CameraDriver: Send + Sync {
    /// Apply a new stream layout; the stream must be stopped
    async fn reconfigure(&mut self, config: &DriverConfig) -> Result<(), CamError>;

    async fn start_stream(&mut self) -> Result<(), CamError>;

    async fn stop_stream(&mut self) -> Result<(), CamError>;

    /// Capture a frame from the main stream
    async fn capture_still(&mut self) -> Result<Frame, CamError>;

    /// Capture a frame from the video/preview stream
    async fn capture_video_frame(&mut self) -> Result<Frame, CamError>;

    async fn set_controls(&mut self, controls: &Controls) -> Result<(), CamError>;

    /// Start encoding the video stream into `path`
    async fn start_encoder(&mut self, path: &Path, settings: &EncoderSettings) -> Result<(), CamError>;

    /// Stop and finalize the current video file
    async fn stop_encoder(&mut self) -> Result<(), CamError>;

    /// Text overlaid on outgoing frames, `None` to clear
    async fn set_annotation(&mut self, text: Option<String>) -> Result<(), CamError>;

    /// Largest sensor mode
    fn sensor_resolution(&self) -> Resolution;

    async fn close(&mut self) -> Result<(), CamError>;
}

/// Pixel-level motion scoring
pub trait MotionAnalyzer: Send + Sync {
    /// Score one frame; higher means more motion
    fn score_frame(&mut self, frame: &Frame) -> f64;

    /// Forget any reference frame
    fn reset(&mut self);
}
