//! Motion detection through a camera session

use std::time::Duration;

use camd::camera::config::MotionMode;
use camd::camera::state::RecordingState;
use camd::command::action::Action;
use camd::command::parser::CommandCode;
use camd::filesys::dir::Dir;
use camd::motion::engine::{MotionDecisionState, MotionParameters, RecordingIntent};

use crate::support::{open_camera, test_config, DriverScript, TestCamera};

const SCORES: [f64; 8] = [6.0, 6.0, 2.0, 6.0, 6.0, 6.0, 2.0, 2.0];

async fn motion_camera(dir: &Dir, mode: MotionMode, delay: u32, scores: &[f64]) -> TestCamera {
    let mut config = test_config(dir.path(), 0);
    config.motion = MotionParameters {
        threshold: 5.0,
        delay_frames: delay,
        start_frames: 3,
        end_frames: 2,
    };
    config.motion_mode = mode;
    config.motion_detection = true;
    open_camera(
        dir.path(),
        0,
        config,
        DriverScript::default(),
        scores,
        Duration::from_secs(2),
    )
    .await
}

async fn execute(camera: &TestCamera, command: CommandCode, param: &str) {
    let action = Action::from_command(command, param).unwrap();
    camera
        .session
        .lock()
        .await
        .unwrap()
        .execute(command, action, param)
        .await
        .unwrap();
}

async fn motion_log(camera: &TestCamera) -> Vec<String> {
    tokio::fs::read_to_string(&camera.session.config().motion_logfile)
        .await
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

async fn sample(camera: &TestCamera, frames: usize) -> Vec<RecordingIntent> {
    let mut intents = Vec::new();
    for _ in 0..frames {
        let mut inner = camera.session.lock().await.unwrap();
        if let Some(intent) = inner.sample_motion().await.unwrap() {
            intents.push(intent);
        }
    }
    intents
}

#[tokio::test]
async fn test_internal_mode_records_one_clip() {
    let dir = Dir::create_temp_dir("camd-motion").await.unwrap();
    let camera = motion_camera(&dir, MotionMode::Internal, 2, &SCORES).await;
    assert!(camera.session.state().motion_enabled);

    let intents = sample(&camera, SCORES.len()).await;
    assert_eq!(
        intents,
        vec![RecordingIntent::StartRecording, RecordingIntent::StopRecording]
    );

    let log = camera.log.lock().unwrap();
    assert_eq!(log.encoders_started.len(), 1);
    assert_eq!(log.encoders_stopped, 1);
    drop(log);
    assert_eq!(camera.session.state().recording, RecordingState::Off);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_monitor_mode_only_logs() {
    let dir = Dir::create_temp_dir("camd-motion").await.unwrap();
    let camera = motion_camera(&dir, MotionMode::Monitor, 2, &SCORES).await;

    let intents = sample(&camera, SCORES.len()).await;
    assert_eq!(intents.len(), 2);
    assert!(camera.log.lock().unwrap().encoders_started.is_empty());

    let lines = motion_log(&camera).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("Camera 0 motion start"));
    assert!(lines[1].ends_with("Camera 0 motion stop"));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_disabling_detection_closes_recording() {
    let dir = Dir::create_temp_dir("camd-motion").await.unwrap();
    let camera = motion_camera(&dir, MotionMode::Internal, 0, &[6.0, 6.0, 6.0]).await;

    let intents = sample(&camera, 3).await;
    assert_eq!(intents, vec![RecordingIntent::StartRecording]);
    assert!(camera.session.state().recording.is_active());

    execute(&camera, CommandCode::MotionDetection, "0").await;

    let state = camera.session.state();
    assert!(!state.motion_enabled);
    assert_eq!(state.recording, RecordingState::Off);
    assert_eq!(camera.log.lock().unwrap().encoders_stopped, 1);

    // Further samples are ignored while detection is off
    assert!(sample(&camera, 3).await.is_empty());
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_stopping_camera_ends_monitored_motion() {
    let dir = Dir::create_temp_dir("camd-motion").await.unwrap();
    let camera = motion_camera(&dir, MotionMode::Monitor, 0, &[6.0, 6.0, 6.0]).await;

    let intents = sample(&camera, 3).await;
    assert_eq!(intents, vec![RecordingIntent::StartRecording]);
    assert_eq!(camera.session.state().motion_state, MotionDecisionState::Detected);

    execute(&camera, CommandCode::Run, "0").await;

    let lines = motion_log(&camera).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("Camera 0 motion start"));
    assert!(lines[1].ends_with("Camera 0 motion stop"));
    let state = camera.session.state();
    assert!(!state.motion_enabled);
    assert_eq!(state.motion_state, MotionDecisionState::Idle);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_manual_stop_keeps_monitored_cycle_open() {
    let dir = Dir::create_temp_dir("camd-motion").await.unwrap();
    let camera = motion_camera(&dir, MotionMode::Monitor, 0, &[6.0, 6.0, 6.0]).await;

    sample(&camera, 3).await;
    execute(&camera, CommandCode::Record, "0").await;

    assert_eq!(camera.session.state().motion_state, MotionDecisionState::Detected);
    assert_eq!(motion_log(&camera).await.len(), 1);
    dir.delete().await.unwrap();
}
