//! Camera runtime state as observed by the status writer

use std::time::Duration;

use serde::Serialize;

use crate::camera::config::{MotionMode, SoloStreamMode};
use crate::motion::engine::MotionDecisionState;
use crate::naming::counters::SequenceCounters;

/// Whether the camera stream is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Stopped,
    Running,
}

/// Video recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Off,
    Active,
    ActiveWithDeadline(Duration),
}

impl RecordingState {
    pub fn is_active(&self) -> bool {
        !matches!(self, RecordingState::Off)
    }
}

/// Status word shown by the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWord {
    Halted,
    Image,
    Video,
    MotionVideo,
    MotionReady,
    Ready,
}

impl StatusWord {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusWord::Halted => "halted",
            StatusWord::Image => "image",
            StatusWord::Video => "video",
            StatusWord::MotionVideo => "md_video",
            StatusWord::MotionReady => "md_ready",
            StatusWord::Ready => "ready",
        }
    }
}

/// Snapshot of one camera's runtime state
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeState {
    pub lifecycle: Lifecycle,
    pub preview_enabled: bool,
    pub recording: RecordingState,
    pub capturing_still: bool,
    pub motion_enabled: bool,
    pub motion_mode: MotionMode,
    pub motion_state: MotionDecisionState,
    pub solo_stream: SoloStreamMode,
    pub counters: SequenceCounters,
    /// Last restart failure, cleared by the next successful restart
    pub last_error: Option<String>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Stopped,
            preview_enabled: true,
            recording: RecordingState::Off,
            capturing_still: false,
            motion_enabled: false,
            motion_mode: MotionMode::Internal,
            motion_state: MotionDecisionState::Idle,
            solo_stream: SoloStreamMode::Off,
            counters: SequenceCounters::default(),
            last_error: None,
        }
    }
}

impl RuntimeState {
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn status_word(&self) -> StatusWord {
        if !self.is_running() {
            StatusWord::Halted
        } else if self.capturing_still {
            StatusWord::Image
        } else if self.recording.is_active() {
            if self.motion_enabled {
                StatusWord::MotionVideo
            } else {
                StatusWord::Video
            }
        } else if self.motion_enabled {
            StatusWord::MotionReady
        } else {
            StatusWord::Ready
        }
    }
}
