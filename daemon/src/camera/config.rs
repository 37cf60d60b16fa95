//! Per-camera configuration
//!
//! Values are held in driver units. Configuration files and commands use
//! the front-end's scale (e.g. sharpness -100..100) and are converted with
//! the functions in [`scale`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::errors::CamError;
use crate::motion::engine::MotionParameters;
use crate::storage::config_file::ConfigEntries;

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Component-wise minimum
    pub fn clamp_to(&self, max: Resolution) -> Resolution {
        Resolution::new(self.width.min(max.width), self.height.min(max.height))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Automatic white balance modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteBalance {
    Auto,
    Tungsten,
    Fluorescent,
    Daylight,
    Cloudy,
    Indoor,
    Incandescent,
    Shade,
    Horizon,
    Greyworld,
    Flash,
}

impl WhiteBalance {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteBalance::Auto => "auto",
            WhiteBalance::Tungsten => "tungsten",
            WhiteBalance::Fluorescent => "fluorescent",
            WhiteBalance::Daylight => "daylight",
            WhiteBalance::Cloudy => "cloudy",
            WhiteBalance::Indoor => "indoor",
            WhiteBalance::Incandescent => "incandescent",
            WhiteBalance::Shade => "shade",
            WhiteBalance::Horizon => "horizon",
            WhiteBalance::Greyworld => "greyworld",
            WhiteBalance::Flash => "flash",
        }
    }
}

impl FromStr for WhiteBalance {
    type Err = CamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(WhiteBalance::Auto),
            "tungsten" => Ok(WhiteBalance::Tungsten),
            "fluorescent" => Ok(WhiteBalance::Fluorescent),
            "daylight" => Ok(WhiteBalance::Daylight),
            "cloudy" => Ok(WhiteBalance::Cloudy),
            "indoor" => Ok(WhiteBalance::Indoor),
            "incandescent" => Ok(WhiteBalance::Incandescent),
            "shade" => Ok(WhiteBalance::Shade),
            "horizon" => Ok(WhiteBalance::Horizon),
            "greyworld" => Ok(WhiteBalance::Greyworld),
            "flash" => Ok(WhiteBalance::Flash),
            other => Err(CamError::ValidationError(format!(
                "unknown white balance mode '{}'",
                other
            ))),
        }
    }
}

/// What happens when motion is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionMode {
    /// Record automatically
    Internal,
    /// Log and signal the motion pipe only
    Monitor,
}

impl MotionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionMode::Internal => "internal",
            MotionMode::Monitor => "monitor",
        }
    }
}

/// Single-stream operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoloStreamMode {
    Off,
    Normal,
    /// Single stream at the sensor's maximum resolution
    MaxRes,
}

impl SoloStreamMode {
    pub fn is_on(&self) -> bool {
        !matches!(self, SoloStreamMode::Off)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SoloStreamMode::Off => "off",
            SoloStreamMode::Normal => "normal",
            SoloStreamMode::MaxRes => "max_res",
        }
    }
}

/// Preview image geometry and refresh divider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreviewGeometry {
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    pub divider: u32,
}

impl PreviewGeometry {
    /// 16:9 height for a preview width
    pub fn default_height(width: u32) -> u32 {
        width * 9 / 16
    }
}

impl Default for PreviewGeometry {
    fn default() -> Self {
        Self {
            quality: 50,
            width: 512,
            height: 288,
            divider: 1,
        }
    }
}

/// Everything a camera session needs to know about its camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraConfig {
    /// Annotation template, resolved on every preview refresh
    pub annotation: String,
    /// File read for the `%a` code
    pub user_annotate: PathBuf,

    pub sharpness: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub analogue_gain: f64,
    pub exposure_compensation: f64,
    pub white_balance: WhiteBalance,
    pub colour_gains: (f64, f64),
    /// Shutter speed in microseconds, 0 for automatic
    pub exposure_time: u64,
    pub hflip: bool,
    pub vflip: bool,

    pub preview: PreviewGeometry,
    pub show_preview: bool,
    pub preview_path: PathBuf,

    /// Still image filename template
    pub image_path: String,
    /// Video filename template
    pub video_path: String,
    pub media_path: PathBuf,

    pub video: Resolution,
    pub video_fps: u32,
    pub mp4_fps: u32,
    pub video_bitrate: u32,
    pub image: Resolution,
    pub image_quality: u8,

    pub motion: MotionParameters,
    pub motion_mode: MotionMode,
    pub motion_detection: bool,
    pub motion_logfile: PathBuf,

    /// Letters of the media kinds that get a thumbnail (`i`, `v`)
    pub thumb_gen: String,
    pub autostart: bool,
    pub user_config: PathBuf,
    pub log_file: PathBuf,
    /// 0 disables the schedule log
    pub log_size: u64,

    pub buffer_count: u32,
    pub solo_stream: SoloStreamMode,
    pub sensor_format: Resolution,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            annotation: "RPi Cam %Y.%M.%D_%h:%m:%s".to_string(),
            user_annotate: PathBuf::from("/dev/shm/mjpeg/user_annotate.txt"),
            sharpness: 1.0,
            contrast: 1.0,
            brightness: 0.0,
            saturation: 1.0,
            analogue_gain: 7.0,
            exposure_compensation: 0.0,
            white_balance: WhiteBalance::Auto,
            colour_gains: (0.0, 0.0),
            exposure_time: 0,
            hflip: false,
            vflip: false,
            preview: PreviewGeometry::default(),
            show_preview: true,
            preview_path: PathBuf::from("/tmp/preview/cam_preview.jpg"),
            image_path: "/tmp/media/im_cam%I_%i_%Y%M%D_%h%m%s.jpg".to_string(),
            video_path: "/tmp/media/vi_cam%I_%v_%Y%M%D_%h%m%s.mp4".to_string(),
            media_path: PathBuf::from("/tmp/media"),
            video: Resolution::new(1920, 1080),
            video_fps: 30,
            mp4_fps: 30,
            video_bitrate: 17_000_000,
            image: Resolution::new(1920, 1080),
            image_quality: 85,
            motion: MotionParameters::default(),
            motion_mode: MotionMode::Internal,
            motion_detection: false,
            motion_logfile: PathBuf::from("/tmp/motionLog.txt"),
            thumb_gen: "vi".to_string(),
            autostart: true,
            user_config: PathBuf::from("/tmp/uconfig"),
            log_file: PathBuf::from("/tmp/scheduleLog.txt"),
            log_size: 5000,
            buffer_count: 2,
            solo_stream: SoloStreamMode::Off,
            sensor_format: Resolution::new(1920, 1080),
        }
    }
}

impl CameraConfig {
    /// Defaults, then the camera config file, then the user config file it names
    pub async fn load_layered(camera_file: Option<&Path>) -> Result<Self, CamError> {
        let mut config = CameraConfig::default();
        if let Some(path) = camera_file {
            let entries = ConfigEntries::load(path).await?;
            config.apply_entries(&entries);
        }
        let user_entries = ConfigEntries::load(&config.user_config).await?;
        config.apply_entries(&user_entries);
        config.normalize();
        Ok(config)
    }

    /// Apply configuration file entries; malformed values are skipped
    pub fn apply_entries(&mut self, entries: &ConfigEntries) {
        for (key, value) in entries.iter() {
            if let Err(e) = self.apply_entry(key, value) {
                warn!("Ignoring config entry '{} {}': {}", key, value, e);
            }
        }
        if entries.get("width").is_some() && entries.get("height").is_none() {
            self.preview.height = PreviewGeometry::default_height(self.preview.width);
        }
    }

    /// Apply one `key value` pair
    pub fn apply_entry(&mut self, key: &str, value: &str) -> Result<(), CamError> {
        match key {
            "annotation" => self.annotation = value.to_string(),
            "user_annotate" => set_path(&mut self.user_annotate, value),
            "sharpness" => self.sharpness = scale::sharpness(parse_num(key, value)?),
            "contrast" => self.contrast = scale::contrast(parse_num(key, value)?),
            "brightness" => self.brightness = scale::brightness(parse_num(key, value)?),
            "saturation" => self.saturation = scale::saturation(parse_num(key, value)?),
            "exposure_compensation" => {
                self.exposure_compensation = scale::exposure_compensation(parse_num(key, value)?)
            }
            "iso" => self.analogue_gain = scale::iso(parse_num(key, value)?),
            "white_balance" => self.white_balance = value.parse()?,
            "autowbgain_r" => self.colour_gains.0 = scale::colour_gain(parse_num(key, value)?),
            "autowbgain_b" => self.colour_gains.1 = scale::colour_gain(parse_num(key, value)?),
            "hflip" => self.hflip = parse_flag(value),
            "vflip" => self.vflip = parse_flag(value),
            "shutter_speed" => self.exposure_time = parse_num(key, value)?,
            "preview_path" => set_path(&mut self.preview_path, value),
            "media_path" => set_path(&mut self.media_path, value),
            "image_path" => set_string(&mut self.image_path, value),
            "video_path" => set_string(&mut self.video_path, value),
            "width" => self.preview.width = parse_num(key, value)?,
            "height" => self.preview.height = parse_num(key, value)?,
            "quality" => self.preview.quality = parse_num::<u8>(key, value)?.clamp(1, 100),
            "divider" => self.preview.divider = parse_num::<u32>(key, value)?.max(1),
            "video_width" => self.video.width = parse_num(key, value)?,
            "video_height" => self.video.height = parse_num(key, value)?,
            "video_fps" => self.video_fps = parse_num(key, value)?,
            "video_bitrate" => self.video_bitrate = parse_num(key, value)?,
            "MP4Box_fps" => self.mp4_fps = parse_num(key, value)?,
            "image_width" => self.image.width = parse_num(key, value)?,
            "image_height" => self.image.height = parse_num(key, value)?,
            "image_quality" => self.image_quality = parse_num::<u8>(key, value)?.clamp(1, 100),
            "motion_external" => {
                self.motion_mode = if value == "2" {
                    MotionMode::Monitor
                } else {
                    MotionMode::Internal
                }
            }
            "motion_threshold" => {
                self.motion.threshold = scale::motion_threshold(parse_num(key, value)?)
            }
            "motion_initframes" => self.motion.delay_frames = parse_num(key, value)?,
            "motion_startframes" => self.motion.start_frames = parse_num(key, value)?,
            "motion_stopframes" => self.motion.end_frames = parse_num(key, value)?,
            "motion_logfile" => set_path(&mut self.motion_logfile, value),
            "thumb_gen" => self.thumb_gen = value.to_string(),
            "autostart" => self.autostart = value == "standard",
            "motion_detection" => self.motion_detection = parse_flag(value),
            "user_config" => set_path(&mut self.user_config, value),
            "log_file" => set_path(&mut self.log_file, value),
            "log_size" => self.log_size = parse_num(key, value)?,
            "show_preview" => self.show_preview = !value.eq_ignore_ascii_case("false"),
            "picam_buffer_count" => self.buffer_count = parse_num::<u32>(key, value)?.max(1),
            "camera_resolution" => self.sensor_format = parse_resolution(value)?,
            "solo_stream_mode" => {
                self.solo_stream = if parse_flag(value) {
                    SoloStreamMode::Normal
                } else {
                    SoloStreamMode::Off
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Settle derived values after loading
    pub fn normalize(&mut self) {
        if self.solo_stream.is_on() {
            self.show_preview = false;
            self.buffer_count = 1;
        }
    }

    /// Directories that hold thumbnails for counter scanning
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        [&self.image_path, &self.video_path]
            .iter()
            .filter_map(|template| Path::new(template.as_str()).parent())
            .map(Path::to_path_buf)
            .collect()
    }

    pub fn wants_thumbnail(&self, letter: char) -> bool {
        self.thumb_gen.contains(letter)
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T, CamError> {
    value
        .trim()
        .parse()
        .map_err(|_| CamError::ConfigError(format!("invalid value for {}: '{}'", key, value)))
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn parse_resolution(value: &str) -> Result<Resolution, CamError> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(w), Some(h)) => Ok(Resolution::new(
            parse_num("width", w)?,
            parse_num("height", h)?,
        )),
        _ => Err(CamError::ConfigError(format!(
            "expected 'width height', got '{}'",
            value
        ))),
    }
}

fn set_path(target: &mut PathBuf, value: &str) {
    if !value.is_empty() {
        *target = PathBuf::from(value);
    }
}

fn set_string(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

/// Conversions from command/config scale to driver scale
pub mod scale {
    /// -100..100 onto 0..16, 0 maps to 1.0
    pub fn sharpness(value: f64) -> f64 {
        centred(value, 15.0).clamp(0.0, 16.0)
    }

    /// -100..100 onto 0..32, 0 maps to 1.0
    pub fn contrast(value: f64) -> f64 {
        centred(value, 31.0).clamp(0.0, 32.0)
    }

    /// -100..100 onto 0..32, 0 maps to 1.0
    pub fn saturation(value: f64) -> f64 {
        centred(value, 31.0).clamp(0.0, 32.0)
    }

    /// 0..100 onto -1..1
    pub fn brightness(value: f64) -> f64 {
        ((value * 2.0 - 100.0) / 100.0).clamp(-1.0, 1.0)
    }

    /// -10..10 onto -8..8
    pub fn exposure_compensation(value: f64) -> f64 {
        (value * 8.0 / 10.0).clamp(-8.0, 8.0)
    }

    pub fn iso(value: f64) -> f64 {
        value / 100.0
    }

    pub fn colour_gain(value: f64) -> f64 {
        (value / 100.0).clamp(0.0, 32.0)
    }

    /// Vector-count threshold onto frame-difference score units
    pub fn motion_threshold(value: f64) -> f64 {
        value / (250.0 / 7.0)
    }

    fn centred(value: f64, positive_span: f64) -> f64 {
        if value == 0.0 {
            1.0
        } else if value > 0.0 {
            1.0 + value * positive_span / 100.0
        } else {
            1.0 + value / 100.0
        }
    }
}
