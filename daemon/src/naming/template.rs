//! Filename template engine
//!
//! Output paths (and the overlay annotation) are written as templates such as
//! `/var/media/im_cam%I_%i_%Y%M%D_%h%m%s.jpg`. A template is parsed into
//! literal spans and format codes, then resolved against a [`TemplateContext`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use thiserror::Error;

/// Template parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown format code '%{code}' at offset {offset}")]
    UnknownCode { code: char, offset: usize },

    #[error("dangling '%' at end of template")]
    DanglingPercent,
}

/// A single format code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCode {
    /// `%Y` four-digit year
    Year4,
    /// `%y` two-digit year
    Year2,
    /// `%M` month
    Month,
    /// `%D` day of month
    Day,
    /// `%h` hour (24h)
    Hour,
    /// `%m` minute
    Minute,
    /// `%s` second
    Second,
    /// `%u` milliseconds
    Millis,
    /// `%i` image index
    ImageIndex,
    /// `%v` video index
    VideoIndex,
    /// `%I` camera index
    CameraIndex,
    /// `%a` user annotation text
    Annotation,
    /// `%%` literal percent
    Percent,
}

impl FormatCode {
    fn from_char(c: char) -> Option<Self> {
        let code = match c {
            'Y' => FormatCode::Year4,
            'y' => FormatCode::Year2,
            'M' => FormatCode::Month,
            'D' => FormatCode::Day,
            'h' => FormatCode::Hour,
            'm' => FormatCode::Minute,
            's' => FormatCode::Second,
            'u' => FormatCode::Millis,
            'i' => FormatCode::ImageIndex,
            'v' => FormatCode::VideoIndex,
            'I' => FormatCode::CameraIndex,
            'a' => FormatCode::Annotation,
            '%' => FormatCode::Percent,
            _ => return None,
        };
        Some(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Code(FormatCode),
}

/// Where `%a` gets its text from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnnotationSource {
    /// No annotation, `%a` resolves to an empty string
    #[default]
    None,
    /// Text substituted verbatim
    Text(String),
}

impl AnnotationSource {
    /// Read the user annotation file; a missing file yields no annotation
    pub async fn from_file(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => AnnotationSource::Text(contents.trim().to_string()),
            Err(_) => AnnotationSource::None,
        }
    }

    fn text(&self) -> &str {
        match self {
            AnnotationSource::None => "",
            AnnotationSource::Text(text) => text,
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub now: DateTime<Local>,
    pub camera_index: usize,
    pub image_index: u32,
    pub video_index: u32,
    pub annotation: AnnotationSource,
}

impl TemplateContext {
    pub fn new(camera_index: usize) -> Self {
        Self {
            now: Local::now(),
            camera_index,
            image_index: 0,
            video_index: 0,
            annotation: AnnotationSource::None,
        }
    }

    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    pub fn with_indices(mut self, image_index: u32, video_index: u32) -> Self {
        self.image_index = image_index;
        self.video_index = video_index;
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationSource) -> Self {
        self.annotation = annotation;
        self
    }
}

/// A parsed filename template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template string
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((offset, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let (_, next) = chars.next().ok_or(TemplateError::DanglingPercent)?;
            let code = FormatCode::from_char(next)
                .ok_or(TemplateError::UnknownCode { code: next, offset })?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Code(code));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Whether the template references the annotation file
    pub fn uses_annotation(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Code(FormatCode::Annotation)))
    }

    /// Substitute every code with its value from `ctx`
    pub fn render(&self, ctx: &TemplateContext) -> String {
        let mut out = String::new();
        let now = &ctx.now;

        for segment in &self.segments {
            let code = match segment {
                Segment::Literal(text) => {
                    out.push_str(text);
                    continue;
                }
                Segment::Code(code) => code,
            };
            // Writing into a String cannot fail
            let _ = match code {
                FormatCode::Year4 => write!(out, "{:04}", now.year()),
                FormatCode::Year2 => write!(out, "{:02}", now.year().rem_euclid(100)),
                FormatCode::Month => write!(out, "{:02}", now.month()),
                FormatCode::Day => write!(out, "{:02}", now.day()),
                FormatCode::Hour => write!(out, "{:02}", now.hour()),
                FormatCode::Minute => write!(out, "{:02}", now.minute()),
                FormatCode::Second => write!(out, "{:02}", now.second()),
                FormatCode::Millis => write!(out, "{:03}", now.timestamp_subsec_millis() % 1000),
                FormatCode::ImageIndex => write!(out, "{}", ctx.image_index),
                FormatCode::VideoIndex => write!(out, "{}", ctx.video_index),
                FormatCode::CameraIndex => write!(out, "{}", ctx.camera_index),
                FormatCode::Annotation => {
                    out.push_str(ctx.annotation.text());
                    Ok(())
                }
                FormatCode::Percent => {
                    out.push('%');
                    Ok(())
                }
            };
        }

        out
    }
}

/// Parse and render a template in one step
pub fn resolve(template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    Ok(FilenameTemplate::parse(template)?.render(ctx))
}

/// Resolve a template into a filesystem path
pub fn resolve_path(template: &str, ctx: &TemplateContext) -> Result<PathBuf, TemplateError> {
    resolve(template, ctx).map(PathBuf::from)
}
