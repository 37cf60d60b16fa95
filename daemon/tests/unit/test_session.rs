//! Camera session tests

use std::time::Duration;

use camd::camera::config::{Resolution, SoloStreamMode};
use camd::camera::state::RecordingState;
use camd::command::action::Action;
use camd::command::parser::CommandCode;
use camd::errors::CamError;
use camd::filesys::dir::Dir;
use camd::naming::counters::{thumbnail_path, MediaKind};

use crate::support::{default_camera, open_camera, test_config, DriverScript};

async fn run(
    session: &camd::camera::session::CameraSession,
    command: CommandCode,
    param: &str,
) -> Result<(), CamError> {
    let action = Action::from_command(command, param)?;
    session.lock().await?.execute(command, action, param).await
}

#[tokio::test]
async fn test_stopped_camera_rejects_commands() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    run(&camera.session, CommandCode::Run, "0").await.unwrap();
    assert!(!camera.session.state().is_running());

    let result = run(&camera.session, CommandCode::Image, "").await;
    assert!(matches!(result, Err(CamError::CameraStopped(0))));
    let result = run(&camera.session, CommandCode::Sharpness, "10").await;
    assert!(matches!(result, Err(CamError::CameraStopped(0))));

    run(&camera.session, CommandCode::Run, "1").await.unwrap();
    assert!(camera.session.state().is_running());
    run(&camera.session, CommandCode::Image, "").await.unwrap();
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_stop_recording_finalizes_once() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    {
        let mut inner = camera.session.lock().await.unwrap();
        let path = inner.start_recording(None).await.unwrap();
        assert!(path.exists());
        assert!(thumbnail_path(&path, MediaKind::Video, 1).exists());

        assert!(inner.stop_recording().await.unwrap());
        assert!(!inner.stop_recording().await.unwrap());
    }

    let log = camera.log.lock().unwrap();
    assert_eq!(log.encoders_started.len(), 1);
    assert_eq!(log.encoders_stopped, 1);
    drop(log);
    assert_eq!(camera.session.state().counters.video, 2);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_second_recording_is_rejected() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    run(&camera.session, CommandCode::Record, "1").await.unwrap();
    let result = run(&camera.session, CommandCode::Record, "1").await;
    assert!(matches!(result, Err(CamError::AlreadyRecording(0))));
    assert_eq!(camera.log.lock().unwrap().encoders_started.len(), 1);

    run(&camera.session, CommandCode::Record, "0").await.unwrap();
    assert_eq!(camera.session.state().recording, RecordingState::Off);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_recording_deadline_stops_recording() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    camera
        .session
        .lock()
        .await
        .unwrap()
        .start_recording(Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(camera.session.state().recording.is_active());

    let mut state_rx = camera.session.subscribe_state();
    let stopped = tokio::time::timeout(
        Duration::from_millis(400),
        async { state_rx.wait_for(|state| state.recording == RecordingState::Off).await.is_ok() },
    )
    .await;
    assert_eq!(stopped, Ok(true));
    assert_eq!(camera.log.lock().unwrap().encoders_stopped, 1);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_manual_stop_cancels_deadline() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    run(&camera.session, CommandCode::Record, "1 1").await.unwrap();
    run(&camera.session, CommandCode::Record, "0").await.unwrap();
    run(&camera.session, CommandCode::Record, "1").await.unwrap();

    // The first deadline must not end the second recording
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(camera.session.state().recording, RecordingState::Active);
    assert_eq!(camera.log.lock().unwrap().encoders_stopped, 1);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_failed_restart_keeps_committed_config() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let script = DriverScript {
        fail_main: Some(Resolution::new(40, 30)),
        ..DriverScript::default()
    };
    let camera = open_camera(
        dir.path(),
        0,
        test_config(dir.path(), 0),
        script,
        &[],
        Duration::from_secs(2),
    )
    .await;

    let before = camera.session.config();
    let mut config_rx = camera.session.subscribe_config();
    config_rx.borrow_and_update();

    let result = run(&camera.session, CommandCode::Pixels, "32 24 30 30 40 30").await;
    assert!(matches!(result, Err(CamError::RestartFailed { camera: 0, .. })));

    assert!(!config_rx.has_changed().unwrap());
    assert_eq!(*camera.session.config(), *before);
    let state = camera.session.state();
    assert!(state.is_running());
    assert!(state.last_error.is_some());

    let inner = camera.session.lock().await.unwrap();
    assert_eq!(inner.config().image, Resolution::new(64, 48));
    assert!(inner.staged().is_empty());
    drop(inner);

    // The stream came back with the previous layout
    let log = camera.log.lock().unwrap();
    assert_eq!(log.reconfigures.last().unwrap().main, Resolution::new(64, 48));
    drop(log);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_observers_see_whole_configurations() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    let before = (Resolution::new(64, 48), Resolution::new(32, 24));
    let after = (Resolution::new(48, 36), Resolution::new(16, 12));

    let mut config_rx = camera.session.subscribe_config();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while config_rx.changed().await.is_ok() {
            let config = config_rx.borrow_and_update().clone();
            seen.push((config.image, config.video));
            if (config.image, config.video) == after {
                break;
            }
        }
        seen
    });

    run(&camera.session, CommandCode::Pixels, "16 12 30 30 48 36").await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(2), observer)
        .await
        .unwrap()
        .unwrap();
    assert!(seen.iter().all(|pair| *pair == before || *pair == after));
    assert_eq!(seen.last(), Some(&after));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_restart_setting_is_deferred_while_recording() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    run(&camera.session, CommandCode::Record, "1").await.unwrap();
    let reconfigures = camera.log.lock().unwrap().reconfigures.len();

    run(&camera.session, CommandCode::Flip, "3").await.unwrap();
    {
        let inner = camera.session.lock().await.unwrap();
        assert_eq!(inner.staged().len(), 1);
        assert!(!inner.config().hflip);
        assert!(inner.runtime().recording.is_active());
    }
    assert_eq!(camera.log.lock().unwrap().reconfigures.len(), reconfigures);

    run(&camera.session, CommandCode::Run, "1").await.unwrap();
    let config = camera.session.config();
    assert!(config.hflip);
    assert!(config.vflip);
    assert_eq!(camera.session.state().recording, RecordingState::Off);
    assert_eq!(camera.log.lock().unwrap().encoders_stopped, 1);

    let persisted = tokio::fs::read_to_string(&config.user_config).await.unwrap();
    assert!(persisted.contains("hflip true"));
    assert!(persisted.contains("vflip true"));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_max_resolution_capture_restores_stream() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let script = DriverScript {
        sensor: Resolution::new(128, 96),
        ..DriverScript::default()
    };
    let camera = open_camera(
        dir.path(),
        0,
        test_config(dir.path(), 0),
        script,
        &[],
        Duration::from_secs(2),
    )
    .await;

    let path = camera
        .session
        .lock()
        .await
        .unwrap()
        .capture_still(true)
        .await
        .unwrap();

    let captured = image::open(&path).unwrap();
    assert_eq!((captured.width(), captured.height()), (128, 96));

    let log = camera.log.lock().unwrap();
    let mains: Vec<Resolution> = log.reconfigures.iter().map(|c| c.main).collect();
    assert!(mains.contains(&Resolution::new(128, 96)));
    let last = log.reconfigures.last().unwrap();
    assert_eq!(last.main, Resolution::new(64, 48));
    assert_eq!(last.lores, Some(Resolution::new(32, 24)));
    drop(log);

    let state = camera.session.state();
    assert!(state.is_running());
    assert_eq!(state.solo_stream, SoloStreamMode::Off);
    assert!(!state.capturing_still);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_resync_counters_after_deleting_thumbnail() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;

    let mut paths = Vec::new();
    for _ in 0..3 {
        let path = camera
            .session
            .lock()
            .await
            .unwrap()
            .capture_still(false)
            .await
            .unwrap();
        paths.push(path);
    }
    assert_eq!(camera.session.state().counters.image, 4);
    assert!(paths[2].to_string_lossy().ends_with("im_0_3.jpg"));

    tokio::fs::remove_file(thumbnail_path(&paths[2], MediaKind::Image, 3))
        .await
        .unwrap();
    run(&camera.session, CommandCode::SetCounts, "").await.unwrap();
    assert_eq!(camera.session.state().counters.image, 3);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_slow_restart_times_out() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let script = DriverScript {
        slow_main: Some(Resolution::new(40, 30)),
        slow_delay: Duration::from_secs(1),
        ..DriverScript::default()
    };
    let camera = open_camera(
        dir.path(),
        0,
        test_config(dir.path(), 0),
        script,
        &[],
        Duration::from_millis(200),
    )
    .await;

    let result = run(&camera.session, CommandCode::Pixels, "32 24 30 30 40 30").await;
    assert!(matches!(result, Err(CamError::RestartTimeout { camera: 0, .. })));
    assert_eq!(camera.session.config().image, Resolution::new(64, 48));
    assert!(camera.session.state().is_running());
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_control_setting_applies_without_restart() {
    let dir = Dir::create_temp_dir("camd-session").await.unwrap();
    let camera = default_camera(&dir).await;
    let starts = camera.log.lock().unwrap().starts;

    run(&camera.session, CommandCode::Brightness, "75").await.unwrap();
    let log = camera.log.lock().unwrap();
    assert_eq!(log.starts, starts);
    assert!(log.controls.last().unwrap().brightness > 0.0);
    drop(log);

    let persisted = tokio::fs::read_to_string(&camera.session.config().user_config)
        .await
        .unwrap();
    assert!(persisted.contains("brightness 75"));
    dir.delete().await.unwrap();
}
