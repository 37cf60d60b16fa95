//! Command routing across cameras

use std::time::Duration;

use camd::camera::config::{CameraConfig, Resolution};
use camd::command::parser::{CommandCode, Target};
use camd::errors::CamError;
use camd::filesys::dir::Dir;
use camd::orchestrator::{Orchestrator, OrchestratorOptions};
use camd::workers::listener;

use crate::support::{open_camera, test_config, DriverScript, TestCamera};

async fn orchestrate(dir: &Dir, configs: Vec<CameraConfig>) -> (Orchestrator, Vec<TestCamera>) {
    let mut cameras = Vec::new();
    for (index, config) in configs.into_iter().enumerate() {
        cameras.push(
            open_camera(
                dir.path(),
                index,
                config,
                DriverScript::default(),
                &[],
                Duration::from_secs(2),
            )
            .await,
        );
    }
    let options = OrchestratorOptions {
        macros_dir: dir.path().join("macros"),
    };
    let sessions = cameras.iter().map(|c| c.session.clone()).collect();
    (Orchestrator::new(sessions, options).unwrap(), cameras)
}

async fn two_cameras(dir: &Dir) -> (Orchestrator, Vec<TestCamera>) {
    let configs = (0..2).map(|index| test_config(dir.path(), index)).collect();
    orchestrate(dir, configs).await
}

#[tokio::test]
async fn test_bracket_positions_address_cameras() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    let outcomes = orchestrator.execute_line("[ru,im] [0,]").await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(!cameras[0].session.state().is_running());
    assert!(cameras[1].session.state().is_running());
    assert_eq!(cameras[1].session.state().counters.image, 2);

    let outcomes = orchestrator.execute_line("[,im]").await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].target, Target::Camera(1));
    assert_eq!(cameras[1].session.state().counters.image, 3);
    assert_eq!(cameras[0].log.lock().unwrap().stills, 0);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_failing_entry_does_not_stop_the_rest() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    let outcomes = orchestrator
        .execute_line("[sh,sh,im] [500,10,]")
        .await
        .unwrap();
    assert!(matches!(outcomes[0].result, Err(CamError::ValidationError(_))));
    assert!(outcomes[1].result.is_ok());
    assert!(matches!(outcomes[2].result, Err(CamError::NotFound(_))));
    assert!(cameras[1].session.config().sharpness > 1.0);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_change_primary() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    let outcomes = orchestrator.execute_line("cn 5").await.unwrap();
    assert!(matches!(outcomes[0].result, Err(CamError::ValidationError(_))));
    assert_eq!(orchestrator.primary(), 0);

    orchestrator.execute_line("cn 1").await.unwrap();
    assert_eq!(orchestrator.primary(), 1);

    orchestrator.execute_line("im").await.unwrap();
    assert_eq!(cameras[1].session.state().counters.image, 2);
    assert_eq!(cameras[0].session.state().counters.image, 1);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_bare_run_switches_every_camera() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    orchestrator.execute_line("ru 0").await.unwrap();
    assert!(cameras.iter().all(|c| !c.session.state().is_running()));

    orchestrator.execute_line("[ru,] 1").await.unwrap();
    assert!(cameras[0].session.state().is_running());
    assert!(!cameras[1].session.state().is_running());
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_stitched_capture_shares_index() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    orchestrator.execute_line("[,im]").await.unwrap();
    assert_eq!(cameras[1].session.state().counters.image, 2);

    let outcomes = orchestrator.execute_line("[im+im]").await.unwrap();
    assert_eq!(outcomes[0].command, CommandCode::StitchedImage);
    assert!(outcomes[0].result.is_ok());

    let expected = dir.path().join("cam0").join("media").join("im_0_2.jpg");
    let stitched = image::open(&expected).unwrap();
    assert_eq!((stitched.width(), stitched.height()), (128, 48));

    assert_eq!(cameras[0].session.state().counters.image, 3);
    assert_eq!(cameras[1].session.state().counters.image, 3);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_stitched_capture_needs_every_camera() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    orchestrator.execute_line("[,ru] [,0]").await.unwrap();
    let outcomes = orchestrator.execute_line("[,im+im] v").await.unwrap();
    assert!(matches!(outcomes[0].result, Err(CamError::CameraStopped(1))));
    assert_eq!(cameras[0].log.lock().unwrap().stills, 0);
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_macro_cannot_escape_directory() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, _cameras) = two_cameras(&dir).await;

    let outcomes = orchestrator.execute_line("sy ../x").await.unwrap();
    assert!(matches!(outcomes[0].result, Err(CamError::ValidationError(_))));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_unparseable_line_is_discarded() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, cameras) = two_cameras(&dir).await;

    assert!(matches!(
        orchestrator.execute_line("zz 1").await,
        Err(CamError::ParseError(_))
    ));
    assert!(orchestrator.execute_line("[im,im").await.is_err());
    assert!(cameras.iter().all(|c| c.log.lock().unwrap().stills == 0));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_listener_line_updates_status() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, _cameras) = two_cameras(&dir).await;
    let options = listener::Options {
        control_file: dir.path().join("FIFO"),
        status_file: dir.path().join("status_mjpeg.txt"),
        ..listener::Options::default()
    };

    listener::handle_line(&options, &orchestrator, "[im,ca] [,1]\n").await;

    let status = tokio::fs::read_to_string(&options.status_file).await.unwrap();
    let lines: Vec<&str> = status.lines().collect();
    assert_eq!(lines[0], "status=ready");
    assert!(lines.contains(&"cameras=2"));
    assert!(lines.contains(&"cam0_image_index=2"));
    assert!(lines.contains(&"cam1_status=video"));
    assert!(lines.contains(&"cam1_recording=1"));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_preview_skips_mismatched_heights() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let mut configs: Vec<CameraConfig> = (0..3).map(|index| test_config(dir.path(), index)).collect();
    configs[1].video = Resolution::new(32, 20);
    let (orchestrator, _cameras) = orchestrate(&dir, configs).await;

    let report = orchestrator.refresh_preview().await.unwrap();
    assert_eq!(report.included, vec![0, 2]);
    assert_eq!(report.excluded, vec![1]);

    let path = report.path.unwrap();
    assert_eq!(path, dir.path().join("cam0").join("preview").join("cam.jpg"));
    let preview = image::open(&path).unwrap();
    assert_eq!((preview.width(), preview.height()), (64, 18));
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_preview_leaves_out_disabled_cameras() {
    let dir = Dir::create_temp_dir("camd-orch").await.unwrap();
    let (orchestrator, _cameras) = two_cameras(&dir).await;

    orchestrator.execute_line("[,dp] [,0]").await.unwrap();
    let report = orchestrator.refresh_preview().await.unwrap();
    assert_eq!(report.included, vec![0]);
    assert!(report.excluded.is_empty());
    let preview = image::open(report.path.unwrap()).unwrap();
    assert_eq!((preview.width(), preview.height()), (32, 18));
    dir.delete().await.unwrap();
}
