//! Image/video sequence counters
//!
//! Every capture leaves a thumbnail next to its output named
//! `<output>.<kind><index>.th.jpg`; the counters are re-derived from the
//! highest index found among those thumbnails.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::CamError;
use crate::filesys::dir::Dir;

/// Kind of captured media, as encoded in thumbnail names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn letter(&self) -> char {
        match self {
            MediaKind::Image => 'i',
            MediaKind::Video => 'v',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'i' => Some(MediaKind::Image),
            'v' => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Next image and video index for one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounters {
    pub image: u32,
    pub video: u32,
}

impl Default for SequenceCounters {
    fn default() -> Self {
        Self { image: 1, video: 1 }
    }
}

impl SequenceCounters {
    /// Take the next index of `kind`, advancing the counter
    pub fn take(&mut self, kind: MediaKind) -> u32 {
        let slot = match kind {
            MediaKind::Image => &mut self.image,
            MediaKind::Video => &mut self.video,
        };
        let index = *slot;
        *slot = slot.saturating_add(1);
        index
    }

    /// Make sure the next image index is strictly greater than `used`
    pub fn skip_image_past(&mut self, used: u32) {
        self.image = self.image.max(used.saturating_add(1));
    }

    /// Derive counters from the thumbnail names in `dirs`
    pub async fn scan(dirs: &[PathBuf]) -> Result<Self, CamError> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for dir in dirs {
            if !seen.insert(dir.clone()) {
                continue;
            }
            let dir = Dir::new(dir);
            if !dir.exists().await {
                debug!("Output directory {:?} does not exist yet", dir.path());
                continue;
            }
            for file in dir.list_files().await? {
                if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        Ok(Self::from_names(names.iter().map(String::as_str)))
    }

    /// Derive counters from a list of file names
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut image = 0;
        let mut video = 0;
        for name in names {
            match parse_thumbnail_name(name) {
                Some((MediaKind::Image, index)) => image = image.max(index),
                Some((MediaKind::Video, index)) => video = video.max(index),
                None => {}
            }
        }
        Self {
            image: image.saturating_add(1),
            video: video.saturating_add(1),
        }
    }
}

/// Thumbnail path for a media file
pub fn thumbnail_path(output: &Path, kind: MediaKind, index: u32) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(format!(".{}{}.th.jpg", kind.letter(), index));
    PathBuf::from(name)
}

/// Extract kind and index from `<anything>.<kind><index>.th.jpg`
fn parse_thumbnail_name(name: &str) -> Option<(MediaKind, u32)> {
    let stem = name.strip_suffix(".th.jpg")?;
    let (_, tag) = stem.rsplit_once('.')?;
    let mut chars = tag.chars();
    let kind = MediaKind::from_letter(chars.next()?)?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|index| (kind, index))
}
