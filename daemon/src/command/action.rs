//! Typed, validated commands
//!
//! Every parsed entry is turned into an [`Action`] before it touches a
//! camera. Validation failures never change state.

use std::str::FromStr;
use std::time::Duration;

use crate::camera::config::{
    scale, CameraConfig, MotionMode, PreviewGeometry, Resolution, SoloStreamMode, WhiteBalance,
};
use crate::command::parser::CommandCode;
use crate::errors::CamError;
use crate::naming::template::FilenameTemplate;

const MAX_BITRATE: u32 = 25_000_000;
const MAX_SHUTTER_US: u64 = 200_000_000;
const MAX_GAIN: f64 = 3200.0;

/// Axis along which stitched frames are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchAxis {
    Horizontal,
    Vertical,
}

/// Settings applied in place while the stream keeps running
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Annotation(String),
    Sharpness(f64),
    Contrast(f64),
    Brightness(f64),
    Saturation(f64),
    WhiteBalance(WhiteBalance),
    ColourGains { red: f64, blue: f64 },
    ShutterSpeed(u64),
    ExposureCompensation(f64),
    AnalogueGain(f64),
    Quality(u8),
    Preview(PreviewGeometry),
    Bitrate(u32),
    MotionMode(MotionMode),
    MotionThreshold(f64),
    MotionDelay(u32),
    MotionStartFrames(u32),
    MotionEndFrames(u32),
}

impl Setting {
    /// Write the setting into `config`; returns whether driver controls changed
    pub fn apply_to(&self, config: &mut CameraConfig) -> bool {
        match self {
            Setting::Annotation(text) => {
                config.annotation = text.clone();
                false
            }
            Setting::Sharpness(v) => {
                config.sharpness = *v;
                true
            }
            Setting::Contrast(v) => {
                config.contrast = *v;
                true
            }
            Setting::Brightness(v) => {
                config.brightness = *v;
                true
            }
            Setting::Saturation(v) => {
                config.saturation = *v;
                true
            }
            Setting::WhiteBalance(mode) => {
                config.white_balance = *mode;
                true
            }
            Setting::ColourGains { red, blue } => {
                config.colour_gains = (*red, *blue);
                true
            }
            Setting::ShutterSpeed(us) => {
                config.exposure_time = *us;
                true
            }
            Setting::ExposureCompensation(v) => {
                config.exposure_compensation = *v;
                true
            }
            Setting::AnalogueGain(v) => {
                config.analogue_gain = *v;
                true
            }
            Setting::Quality(q) => {
                config.image_quality = *q;
                false
            }
            Setting::Preview(geometry) => {
                config.preview = *geometry;
                false
            }
            Setting::Bitrate(bps) => {
                config.video_bitrate = *bps;
                false
            }
            Setting::MotionMode(mode) => {
                config.motion_mode = *mode;
                false
            }
            Setting::MotionThreshold(t) => {
                config.motion.threshold = *t;
                false
            }
            Setting::MotionDelay(n) => {
                config.motion.delay_frames = *n;
                false
            }
            Setting::MotionStartFrames(n) => {
                config.motion.start_frames = *n;
                false
            }
            Setting::MotionEndFrames(n) => {
                config.motion.end_frames = *n;
                false
            }
        }
    }
}

/// Size change requested by `cs`; `None` means "use the sensor format"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SizeSpec {
    fn resolve(&self, sensor: Resolution) -> Resolution {
        Resolution::new(
            self.width.unwrap_or(sensor.width),
            self.height.unwrap_or(sensor.height),
        )
    }
}

/// Settings that require the stream to be stopped and reconfigured
#[derive(Debug, Clone, PartialEq)]
pub enum RestartSetting {
    Flip { hflip: bool, vflip: bool },
    Pixels {
        video: Resolution,
        video_fps: u32,
        mp4_fps: u32,
        image: Resolution,
    },
    CameraResolution(Resolution),
    StreamSizes {
        image: Option<SizeSpec>,
        video: Option<SizeSpec>,
    },
    SoloStream(SoloStreamMode),
}

impl RestartSetting {
    /// Write the setting into `config`; `sensor_max` is the driver's largest mode
    pub fn apply_to(&self, config: &mut CameraConfig, sensor_max: Resolution) {
        match self {
            RestartSetting::Flip { hflip, vflip } => {
                config.hflip = *hflip;
                config.vflip = *vflip;
            }
            RestartSetting::Pixels {
                video,
                video_fps,
                mp4_fps,
                image,
            } => {
                config.video = *video;
                config.video_fps = *video_fps;
                config.mp4_fps = *mp4_fps;
                config.image = *image;
            }
            RestartSetting::CameraResolution(resolution) => {
                config.sensor_format = *resolution;
            }
            RestartSetting::StreamSizes { image, video } => {
                if let Some(spec) = image {
                    config.image = spec.resolve(config.sensor_format);
                }
                if let Some(spec) = video {
                    config.video = spec.resolve(config.sensor_format);
                }
            }
            RestartSetting::SoloStream(mode) => {
                config.solo_stream = *mode;
                match mode {
                    SoloStreamMode::Off => {}
                    SoloStreamMode::Normal => {
                        config.show_preview = false;
                        config.buffer_count = 1;
                    }
                    SoloStreamMode::MaxRes => {
                        config.sensor_format = sensor_max;
                        config.show_preview = false;
                        config.buffer_count = 1;
                    }
                }
            }
        }
    }
}

/// A validated command for one camera (or all, for stitched captures)
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Run(bool),
    ChangePrimary(usize),
    DisplayPreview(bool),
    StartRecording(Option<Duration>),
    StopRecording,
    Capture { max_res: bool },
    StitchedCapture { max_res: bool, axis: StitchAxis },
    MotionDetection(bool),
    Setting(Setting),
    Restart(RestartSetting),
    ResetConfig,
    ResyncCounters,
    Macro { name: String, args: Vec<String> },
}

impl Action {
    /// Validate `param` for `command`
    pub fn from_command(command: CommandCode, param: &str) -> Result<Self, CamError> {
        let trimmed = param.trim();
        let action = match command {
            CommandCode::Run => Action::Run(parse_switch(command, trimmed)?),
            CommandCode::ChangePrimary => Action::ChangePrimary(parse_value(command, trimmed)?),
            CommandCode::DisplayPreview => Action::DisplayPreview(parse_switch(command, trimmed)?),
            CommandCode::Record => parse_record(trimmed)?,
            CommandCode::Image => Action::Capture { max_res: false },
            CommandCode::ImageMaxRes => Action::Capture { max_res: true },
            CommandCode::StitchedImage => Action::StitchedCapture {
                max_res: false,
                axis: parse_axis(trimmed)?,
            },
            CommandCode::StitchedImageMaxRes => Action::StitchedCapture {
                max_res: true,
                axis: parse_axis(trimmed)?,
            },
            CommandCode::MotionDetection => Action::MotionDetection(match trimmed {
                "" | "0" => false,
                "1" => true,
                _ => return Err(invalid(command, param, "expected 0 or 1")),
            }),
            CommandCode::MotionMode => Action::Setting(Setting::MotionMode(match trimmed {
                "0" => MotionMode::Internal,
                "2" => MotionMode::Monitor,
                _ => return Err(invalid(command, param, "expected 0 (internal) or 2 (monitor)")),
            })),
            CommandCode::MotionThreshold => {
                let value: u32 = parse_value(command, trimmed)?;
                Action::Setting(Setting::MotionThreshold(scale::motion_threshold(
                    f64::from(value),
                )))
            }
            CommandCode::MotionDelay => {
                Action::Setting(Setting::MotionDelay(parse_value(command, trimmed)?))
            }
            CommandCode::MotionStartFrames => {
                Action::Setting(Setting::MotionStartFrames(parse_value(command, trimmed)?))
            }
            CommandCode::MotionEndFrames => {
                Action::Setting(Setting::MotionEndFrames(parse_value(command, trimmed)?))
            }
            CommandCode::Bitrate => {
                let bps: u32 = parse_value(command, trimmed)?;
                check_range(command, param, bps <= MAX_BITRATE)?;
                Action::Setting(Setting::Bitrate(bps))
            }
            CommandCode::Sharpness => Action::Setting(Setting::Sharpness(scale::sharpness(
                parse_in_range(command, trimmed, -100.0, 100.0)?,
            ))),
            CommandCode::Contrast => Action::Setting(Setting::Contrast(scale::contrast(
                parse_in_range(command, trimmed, -100.0, 100.0)?,
            ))),
            CommandCode::Saturation => Action::Setting(Setting::Saturation(scale::saturation(
                parse_in_range(command, trimmed, -100.0, 100.0)?,
            ))),
            CommandCode::Brightness => Action::Setting(Setting::Brightness(scale::brightness(
                parse_in_range(command, trimmed, 0.0, 100.0)?,
            ))),
            CommandCode::ExposureCompensation => {
                Action::Setting(Setting::ExposureCompensation(scale::exposure_compensation(
                    parse_in_range(command, trimmed, -10.0, 10.0)?,
                )))
            }
            CommandCode::Iso => Action::Setting(Setting::AnalogueGain(scale::iso(
                parse_in_range(command, trimmed, 0.0, MAX_GAIN)?,
            ))),
            CommandCode::WhiteBalance => {
                Action::Setting(Setting::WhiteBalance(WhiteBalance::from_str(trimmed)?))
            }
            CommandCode::ColourGains => {
                let values = parse_list::<f64>(command, trimmed)?;
                let &[red, blue] = values.as_slice() else {
                    return Err(invalid(command, param, "expected 'red blue'"));
                };
                check_range(
                    command,
                    param,
                    (0.0..=MAX_GAIN).contains(&red) && (0.0..=MAX_GAIN).contains(&blue),
                )?;
                Action::Setting(Setting::ColourGains {
                    red: scale::colour_gain(red),
                    blue: scale::colour_gain(blue),
                })
            }
            CommandCode::ShutterSpeed => {
                let us: u64 = parse_value(command, trimmed)?;
                check_range(command, param, us <= MAX_SHUTTER_US)?;
                Action::Setting(Setting::ShutterSpeed(us))
            }
            CommandCode::Annotation => {
                FilenameTemplate::parse(param)
                    .map_err(|e| invalid(command, param, &e.to_string()))?;
                Action::Setting(Setting::Annotation(param.to_string()))
            }
            CommandCode::Quality => {
                let quality: u8 = parse_value(command, trimmed)?;
                check_range(command, param, (1..=100).contains(&quality))?;
                Action::Setting(Setting::Quality(quality))
            }
            CommandCode::Preview => Action::Setting(Setting::Preview(parse_preview(trimmed)?)),
            CommandCode::Pixels => {
                let values = parse_list::<u32>(command, trimmed)?;
                if values.len() < 6 || values[..6].contains(&0) {
                    return Err(invalid(command, param, "expected 'vw vh vfps boxfps iw ih'"));
                }
                Action::Restart(RestartSetting::Pixels {
                    video: Resolution::new(values[0], values[1]),
                    video_fps: values[2],
                    mp4_fps: values[3],
                    image: Resolution::new(values[4], values[5]),
                })
            }
            CommandCode::Flip => {
                let (hflip, vflip) = match trimmed {
                    "0" => (false, false),
                    "1" => (true, false),
                    "2" => (false, true),
                    "3" => (true, true),
                    _ => return Err(invalid(command, param, "expected 0..3")),
                };
                Action::Restart(RestartSetting::Flip { hflip, vflip })
            }
            CommandCode::CameraResolution => {
                let values = parse_list::<u32>(command, trimmed)?;
                let &[width, height] = values.as_slice() else {
                    return Err(invalid(command, param, "expected 'width height'"));
                };
                check_range(command, param, width > 0 && height > 0)?;
                Action::Restart(RestartSetting::CameraResolution(Resolution::new(width, height)))
            }
            CommandCode::StreamSizes => parse_stream_sizes(trimmed)?,
            CommandCode::SoloStream => Action::Restart(RestartSetting::SoloStream(match trimmed {
                "0" => SoloStreamMode::Off,
                "1" => SoloStreamMode::Normal,
                "2" => SoloStreamMode::MaxRes,
                _ => return Err(invalid(command, param, "expected 0, 1 or 2")),
            })),
            CommandCode::Reset => Action::ResetConfig,
            CommandCode::SetCounts => Action::ResyncCounters,
            CommandCode::Macro => {
                let mut parts = trimmed.split_whitespace();
                let name = parts
                    .next()
                    .ok_or_else(|| invalid(command, param, "missing macro name"))?;
                Action::Macro {
                    name: name.to_string(),
                    args: parts.map(str::to_string).collect(),
                }
            }
        };
        Ok(action)
    }
}

fn invalid(command: CommandCode, param: &str, reason: &str) -> CamError {
    CamError::ValidationError(format!("{} '{}': {}", command, param, reason))
}

fn check_range(command: CommandCode, param: &str, ok: bool) -> Result<(), CamError> {
    if ok {
        Ok(())
    } else {
        Err(invalid(command, param, "value out of range"))
    }
}

fn parse_value<T: FromStr>(command: CommandCode, value: &str) -> Result<T, CamError> {
    value
        .parse()
        .map_err(|_| invalid(command, value, "not a valid number"))
}

fn parse_in_range(command: CommandCode, value: &str, min: f64, max: f64) -> Result<f64, CamError> {
    let parsed: f64 = parse_value(command, value)?;
    check_range(command, value, parsed.is_finite() && (min..=max).contains(&parsed))?;
    Ok(parsed)
}

fn parse_list<T: FromStr>(command: CommandCode, value: &str) -> Result<Vec<T>, CamError> {
    value
        .split_whitespace()
        .map(|token| parse_value(command, token))
        .collect()
}

fn parse_switch(command: CommandCode, value: &str) -> Result<bool, CamError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(invalid(command, value, "expected 0 or 1")),
    }
}

fn parse_axis(value: &str) -> Result<StitchAxis, CamError> {
    match value {
        "" | "h" => Ok(StitchAxis::Horizontal),
        "v" => Ok(StitchAxis::Vertical),
        _ => Err(invalid(CommandCode::StitchedImage, value, "expected 'h' or 'v'")),
    }
}

fn parse_record(value: &str) -> Result<Action, CamError> {
    let mut parts = value.split_whitespace();
    match parts.next() {
        Some("0") | None => Ok(Action::StopRecording),
        Some("1") => {
            let duration = match parts.next() {
                None => None,
                Some(secs) => {
                    let secs: u64 = parse_value(CommandCode::Record, secs)?;
                    (secs > 0).then(|| Duration::from_secs(secs))
                }
            };
            Ok(Action::StartRecording(duration))
        }
        Some(_) => Err(invalid(CommandCode::Record, value, "expected '1 [seconds]' or '0'")),
    }
}

fn parse_preview(value: &str) -> Result<PreviewGeometry, CamError> {
    let values = parse_list::<u32>(CommandCode::Preview, value)?;
    if values.len() < 3 {
        return Err(invalid(
            CommandCode::Preview,
            value,
            "expected 'quality width divider [height]'",
        ));
    }
    let (quality, width, divider) = (values[0], values[1], values[2]);
    let height = values
        .get(3)
        .copied()
        .unwrap_or_else(|| PreviewGeometry::default_height(width));
    check_range(
        CommandCode::Preview,
        value,
        (1..=100).contains(&quality) && width >= 1 && divider >= 1 && height >= 1,
    )?;
    Ok(PreviewGeometry {
        quality: quality as u8,
        width,
        height,
        divider,
    })
}

fn parse_size_spec(width: &str, height: &str) -> Result<SizeSpec, CamError> {
    let side = |token: &str| -> Result<Option<u32>, CamError> {
        if token == "=" {
            return Ok(None);
        }
        let value: u32 = parse_value(CommandCode::StreamSizes, token)?;
        check_range(CommandCode::StreamSizes, token, value > 0)?;
        Ok(Some(value))
    };
    Ok(SizeSpec {
        width: side(width)?,
        height: side(height)?,
    })
}

fn parse_stream_sizes(value: &str) -> Result<Action, CamError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let usage = || {
        invalid(
            CommandCode::StreamSizes,
            value,
            "expected 'i|v|i+v width height [width2 height2]'",
        )
    };
    let setting = match parts.as_slice() {
        ["i", w, h, ..] => RestartSetting::StreamSizes {
            image: Some(parse_size_spec(w, h)?),
            video: None,
        },
        ["v", w, h, ..] => RestartSetting::StreamSizes {
            image: None,
            video: Some(parse_size_spec(w, h)?),
        },
        ["i+v" | "v+i", w1, h1, w2, h2, ..] => RestartSetting::StreamSizes {
            image: Some(parse_size_spec(w1, h1)?),
            video: Some(parse_size_spec(w2, h2)?),
        },
        _ => return Err(usage()),
    };
    Ok(Action::Restart(setting))
}
