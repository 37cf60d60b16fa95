//! Command channel line parser
//!
//! A line is either `CODE PARAM` (targets the primary camera) or
//! `[c0,c1,...] PARAMS` where position `i` addresses camera `i`. `PARAMS`
//! is either one token applied to every position or `[p0,p1,...]` aligned
//! with the command positions. Inside a bracketed parameter list `/,` is a
//! literal comma.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing a command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command line")]
    Empty,

    #[error("missing closing ']' in command list")]
    UnclosedCommandList,

    #[error("missing closing ']' in parameter list")]
    UnclosedParamList,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{0}' is only valid inside a bracketed command list")]
    StitchedOutsideBracket(String),

    #[error("mismatched comma count: {commands} commands, {params} parameters")]
    ParamCountMismatch { commands: usize, params: usize },
}

/// Every command the daemon understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// `ru`: start/stop the camera
    Run,
    /// `cn`: change the primary camera
    ChangePrimary,
    /// `fl`: flip mode
    Flip,
    /// `dp`: display preview on/off
    DisplayPreview,
    /// `ca`: start/stop recording
    Record,
    /// `im`: still capture
    Image,
    /// `ix`: still capture at sensor maximum
    ImageMaxRes,
    /// `im+im`: stitched still capture across all cameras
    StitchedImage,
    /// `ix+ix`: stitched sensor-maximum capture across all cameras
    StitchedImageMaxRes,
    /// `md`: motion detection on/off
    MotionDetection,
    /// `mx`: motion mode
    MotionMode,
    /// `mt`: motion threshold
    MotionThreshold,
    /// `ms`: motion start delay frames
    MotionDelay,
    /// `mb`: motion start frame count
    MotionStartFrames,
    /// `me`: motion end frame count
    MotionEndFrames,
    /// `bi`: video bitrate
    Bitrate,
    /// `sh`: sharpness
    Sharpness,
    /// `co`: contrast
    Contrast,
    /// `br`: brightness
    Brightness,
    /// `sa`: saturation
    Saturation,
    /// `wb`: white balance mode
    WhiteBalance,
    /// `ag`: colour gains
    ColourGains,
    /// `ss`: shutter speed
    ShutterSpeed,
    /// `an`: annotation template
    Annotation,
    /// `ec`: exposure compensation
    ExposureCompensation,
    /// `is`: ISO
    Iso,
    /// `qu`: JPEG quality
    Quality,
    /// `pv`: preview geometry
    Preview,
    /// `px`: bulk video/image sizes
    Pixels,
    /// `rs`: reset user configuration
    Reset,
    /// `sc`: resync sequence counters
    SetCounts,
    /// `cr`: sensor resolution
    CameraResolution,
    /// `cs`: stream sizes
    StreamSizes,
    /// `1s`: solo stream mode
    SoloStream,
    /// `sy`: run a macro
    Macro,
}

impl CommandCode {
    pub const ALL: [CommandCode; 35] = [
        CommandCode::Run,
        CommandCode::ChangePrimary,
        CommandCode::Flip,
        CommandCode::DisplayPreview,
        CommandCode::Record,
        CommandCode::Image,
        CommandCode::ImageMaxRes,
        CommandCode::StitchedImage,
        CommandCode::StitchedImageMaxRes,
        CommandCode::MotionDetection,
        CommandCode::MotionMode,
        CommandCode::MotionThreshold,
        CommandCode::MotionDelay,
        CommandCode::MotionStartFrames,
        CommandCode::MotionEndFrames,
        CommandCode::Bitrate,
        CommandCode::Sharpness,
        CommandCode::Contrast,
        CommandCode::Brightness,
        CommandCode::Saturation,
        CommandCode::WhiteBalance,
        CommandCode::ColourGains,
        CommandCode::ShutterSpeed,
        CommandCode::Annotation,
        CommandCode::ExposureCompensation,
        CommandCode::Iso,
        CommandCode::Quality,
        CommandCode::Preview,
        CommandCode::Pixels,
        CommandCode::Reset,
        CommandCode::SetCounts,
        CommandCode::CameraResolution,
        CommandCode::StreamSizes,
        CommandCode::SoloStream,
        CommandCode::Macro,
    ];

    /// The two-letter code used on the wire
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CommandCode::Run => "ru",
            CommandCode::ChangePrimary => "cn",
            CommandCode::Flip => "fl",
            CommandCode::DisplayPreview => "dp",
            CommandCode::Record => "ca",
            CommandCode::Image => "im",
            CommandCode::ImageMaxRes => "ix",
            CommandCode::StitchedImage => "im+im",
            CommandCode::StitchedImageMaxRes => "ix+ix",
            CommandCode::MotionDetection => "md",
            CommandCode::MotionMode => "mx",
            CommandCode::MotionThreshold => "mt",
            CommandCode::MotionDelay => "ms",
            CommandCode::MotionStartFrames => "mb",
            CommandCode::MotionEndFrames => "me",
            CommandCode::Bitrate => "bi",
            CommandCode::Sharpness => "sh",
            CommandCode::Contrast => "co",
            CommandCode::Brightness => "br",
            CommandCode::Saturation => "sa",
            CommandCode::WhiteBalance => "wb",
            CommandCode::ColourGains => "ag",
            CommandCode::ShutterSpeed => "ss",
            CommandCode::Annotation => "an",
            CommandCode::ExposureCompensation => "ec",
            CommandCode::Iso => "is",
            CommandCode::Quality => "qu",
            CommandCode::Preview => "pv",
            CommandCode::Pixels => "px",
            CommandCode::Reset => "rs",
            CommandCode::SetCounts => "sc",
            CommandCode::CameraResolution => "cr",
            CommandCode::StreamSizes => "cs",
            CommandCode::SoloStream => "1s",
            CommandCode::Macro => "sy",
        }
    }

    /// Stitched captures address every camera at once
    pub fn is_stitched(&self) -> bool {
        matches!(
            self,
            CommandCode::StitchedImage | CommandCode::StitchedImageMaxRes
        )
    }
}

impl FromStr for CommandCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandCode::ALL
            .iter()
            .find(|code| code.mnemonic() == s)
            .copied()
            .ok_or_else(|| ParseError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Which camera(s) an entry addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Whichever camera is currently primary
    Primary,
    /// A specific camera slot
    Camera(usize),
    /// Every camera; `anchor` is the bracket position that issued it
    All { anchor: usize },
}

/// One command addressed to one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub target: Target,
    pub command: CommandCode,
    pub param: String,
}

/// All entries produced by one command line, in bracket order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBatch(pub Vec<CommandEntry>);

impl CommandBatch {
    pub fn entries(&self) -> &[CommandEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for CommandBatch {
    type Item = CommandEntry;
    type IntoIter = std::vec::IntoIter<CommandEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Parse one command channel line
pub fn parse_line(line: &str) -> Result<CommandBatch, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    if line.starts_with('[') {
        parse_bracketed(line)
    } else {
        parse_bare(line)
    }
}

fn parse_bare(line: &str) -> Result<CommandBatch, ParseError> {
    let (code, param) = match line.split_once(' ') {
        Some((code, param)) => (code, param),
        None => (line, ""),
    };

    let command: CommandCode = code.parse()?;
    if command.is_stitched() {
        return Err(ParseError::StitchedOutsideBracket(code.to_string()));
    }

    Ok(CommandBatch(vec![CommandEntry {
        target: Target::Primary,
        command,
        param: param.to_string(),
    }]))
}

fn parse_bracketed(line: &str) -> Result<CommandBatch, ParseError> {
    let (codes, rest) = line[1..]
        .split_once(']')
        .ok_or(ParseError::UnclosedCommandList)?;

    let codes = codes
        .split(',')
        .map(|code| {
            let code = code.trim();
            if code.is_empty() {
                Ok(None)
            } else {
                code.parse::<CommandCode>().map(Some)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let params = parse_params(rest.trim(), codes.len())?;

    let entries = codes
        .into_iter()
        .zip(params)
        .enumerate()
        .filter_map(|(position, (command, param))| {
            let command = command?;
            let target = if command.is_stitched() {
                Target::All { anchor: position }
            } else {
                Target::Camera(position)
            };
            Some(CommandEntry {
                target,
                command,
                param,
            })
        })
        .collect();

    Ok(CommandBatch(entries))
}

/// Build one parameter per command position
fn parse_params(rest: &str, commands: usize) -> Result<Vec<String>, ParseError> {
    if rest.is_empty() {
        return Ok(vec![String::new(); commands]);
    }

    if !rest.starts_with('[') {
        return Ok(vec![rest.to_string(); commands]);
    }

    let inner = rest[1..]
        .strip_suffix(']')
        .ok_or(ParseError::UnclosedParamList)?;
    let mut params = split_escaped(inner);

    if params.len() > commands {
        return Err(ParseError::ParamCountMismatch {
            commands,
            params: params.len(),
        });
    }
    params.resize(commands, String::new());
    Ok(params)
}

/// Split on commas not preceded by `/`, unescaping `/,` to `,`
fn split_escaped(inner: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&',') => {
                chars.next();
                current.push(',');
            }
            ',' => params.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    params.push(current);
    params
}
