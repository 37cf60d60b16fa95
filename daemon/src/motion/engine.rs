//! Motion decision state machine
//!
//! Turns a stream of per-frame motion scores into start/stop recording
//! intents. A frame whose score reaches the threshold is a motion frame,
//! anything below it is a still frame.

use serde::Serialize;

/// Tunables read on every sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionParameters {
    /// Score at or above which a frame counts as motion
    pub threshold: f64,
    /// Frames to skip after the first motion frame
    pub delay_frames: u32,
    /// Consecutive motion frames needed to start
    pub start_frames: u32,
    /// Consecutive still frames needed to stop
    pub end_frames: u32,
}

impl Default for MotionParameters {
    fn default() -> Self {
        Self {
            threshold: 7.0,
            delay_frames: 0,
            start_frames: 3,
            end_frames: 50,
        }
    }
}

/// Where the engine currently is in a detection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionDecisionState {
    Idle,
    Delaying(u32),
    Accumulating(u32),
    Detected,
    Ending(u32),
}

impl MotionDecisionState {
    pub fn name(&self) -> &'static str {
        match self {
            MotionDecisionState::Idle => "idle",
            MotionDecisionState::Delaying(_) => "delaying",
            MotionDecisionState::Accumulating(_) => "accumulating",
            MotionDecisionState::Detected => "detected",
            MotionDecisionState::Ending(_) => "ending",
        }
    }

    /// Motion is considered in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            MotionDecisionState::Detected | MotionDecisionState::Ending(_)
        )
    }
}

/// What the engine wants the camera to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingIntent {
    StartRecording,
    StopRecording,
}

/// Per-camera motion decision engine
#[derive(Debug, Clone)]
pub struct MotionEngine {
    state: MotionDecisionState,
}

impl Default for MotionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionEngine {
    pub fn new() -> Self {
        Self {
            state: MotionDecisionState::Idle,
        }
    }

    pub fn state(&self) -> MotionDecisionState {
        self.state
    }

    /// Feed one frame's score
    pub fn on_score(&mut self, score: f64, params: &MotionParameters) -> Option<RecordingIntent> {
        let motion = score >= params.threshold;
        let start_frames = params.start_frames.max(1);
        let end_frames = params.end_frames.max(1);

        let (next, intent) = match (self.state, motion) {
            (MotionDecisionState::Idle, false) => (MotionDecisionState::Idle, None),
            (MotionDecisionState::Idle, true) => {
                if params.delay_frames == 0 {
                    accumulate(1, start_frames)
                } else {
                    (MotionDecisionState::Delaying(params.delay_frames), None)
                }
            }
            (MotionDecisionState::Delaying(remaining), _) => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    (MotionDecisionState::Accumulating(0), None)
                } else {
                    (MotionDecisionState::Delaying(remaining), None)
                }
            }
            (MotionDecisionState::Accumulating(_), false) => {
                (MotionDecisionState::Accumulating(0), None)
            }
            (MotionDecisionState::Accumulating(count), true) => accumulate(count + 1, start_frames),
            (MotionDecisionState::Detected, true) | (MotionDecisionState::Ending(_), true) => {
                (MotionDecisionState::Detected, None)
            }
            (MotionDecisionState::Detected, false) => settle(1, end_frames),
            (MotionDecisionState::Ending(count), false) => settle(count + 1, end_frames),
        };

        self.state = next;
        intent
    }

    /// Detection switched off; a cycle in progress is closed
    pub fn disable(&mut self) -> Option<RecordingIntent> {
        let intent = self
            .state
            .is_active()
            .then_some(RecordingIntent::StopRecording);
        self.state = MotionDecisionState::Idle;
        intent
    }

    /// Return to idle without emitting anything
    pub fn reset(&mut self) {
        self.state = MotionDecisionState::Idle;
    }
}

fn accumulate(count: u32, start_frames: u32) -> (MotionDecisionState, Option<RecordingIntent>) {
    if count >= start_frames {
        (
            MotionDecisionState::Detected,
            Some(RecordingIntent::StartRecording),
        )
    } else {
        (MotionDecisionState::Accumulating(count), None)
    }
}

fn settle(count: u32, end_frames: u32) -> (MotionDecisionState, Option<RecordingIntent>) {
    if count >= end_frames {
        (MotionDecisionState::Idle, Some(RecordingIntent::StopRecording))
    } else {
        (MotionDecisionState::Ending(count), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(delay: u32, start: u32, end: u32) -> MotionParameters {
        MotionParameters {
            threshold: 5.0,
            delay_frames: delay,
            start_frames: start,
            end_frames: end,
        }
    }

    fn run(engine: &mut MotionEngine, scores: &[f64], params: &MotionParameters) -> Vec<RecordingIntent> {
        scores
            .iter()
            .filter_map(|score| engine.on_score(*score, params))
            .collect()
    }

    #[test]
    fn test_full_cycle_emits_one_start_and_one_stop() {
        let mut engine = MotionEngine::new();
        let intents = run(
            &mut engine,
            &[6.0, 6.0, 2.0, 6.0, 6.0, 6.0, 2.0, 2.0],
            &params(2, 3, 2),
        );
        assert_eq!(
            intents,
            vec![RecordingIntent::StartRecording, RecordingIntent::StopRecording]
        );
        assert_eq!(engine.state(), MotionDecisionState::Idle);
    }

    #[test]
    fn test_delay_counts_down_regardless_of_score() {
        let mut engine = MotionEngine::new();
        let p = params(3, 2, 2);
        engine.on_score(9.0, &p);
        assert_eq!(engine.state(), MotionDecisionState::Delaying(3));
        engine.on_score(0.0, &p);
        assert_eq!(engine.state(), MotionDecisionState::Delaying(2));
        engine.on_score(0.0, &p);
        engine.on_score(0.0, &p);
        assert_eq!(engine.state(), MotionDecisionState::Accumulating(0));
    }

    #[test]
    fn test_still_frame_resets_accumulation() {
        let mut engine = MotionEngine::new();
        let p = params(0, 3, 2);
        assert!(run(&mut engine, &[6.0, 6.0, 1.0], &p).is_empty());
        assert_eq!(engine.state(), MotionDecisionState::Accumulating(0));
        assert_eq!(
            run(&mut engine, &[6.0, 6.0, 6.0], &p),
            vec![RecordingIntent::StartRecording]
        );
    }

    #[test]
    fn test_zero_delay_counts_trigger_frame() {
        let mut engine = MotionEngine::new();
        let p = params(0, 1, 1);
        assert_eq!(engine.on_score(5.0, &p), Some(RecordingIntent::StartRecording));
        assert_eq!(engine.on_score(0.0, &p), Some(RecordingIntent::StopRecording));
    }

    #[test]
    fn test_zero_frame_counts_behave_as_one() {
        let mut engine = MotionEngine::new();
        let p = params(0, 0, 0);
        assert_eq!(engine.on_score(5.0, &p), Some(RecordingIntent::StartRecording));
        assert_eq!(engine.on_score(1.0, &p), Some(RecordingIntent::StopRecording));
    }

    #[test]
    fn test_motion_during_ending_returns_to_detected() {
        let mut engine = MotionEngine::new();
        let p = params(0, 1, 3);
        engine.on_score(6.0, &p);
        engine.on_score(1.0, &p);
        engine.on_score(1.0, &p);
        assert_eq!(engine.state(), MotionDecisionState::Ending(2));
        engine.on_score(6.0, &p);
        assert_eq!(engine.state(), MotionDecisionState::Detected);
    }

    #[test]
    fn test_disable_mid_cycle() {
        let mut engine = MotionEngine::new();
        let p = params(0, 1, 5);
        engine.on_score(6.0, &p);
        assert_eq!(engine.disable(), Some(RecordingIntent::StopRecording));
        assert_eq!(engine.state(), MotionDecisionState::Idle);

        engine.on_score(6.0, &params(2, 1, 5));
        assert_eq!(engine.disable(), None);
    }

    #[test]
    fn test_parameter_change_keeps_state() {
        let mut engine = MotionEngine::new();
        engine.on_score(6.0, &params(0, 5, 2));
        engine.on_score(6.0, &params(0, 5, 2));
        assert_eq!(engine.state(), MotionDecisionState::Accumulating(2));
        assert_eq!(
            engine.on_score(6.0, &params(0, 3, 2)),
            Some(RecordingIntent::StartRecording)
        );
    }
}
