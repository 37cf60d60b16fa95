//! Status artifact
//!
//! A `key=value` text file describing every camera, rebuilt from the
//! published session snapshots and replaced atomically.

use std::fmt::Write as _;
use std::path::Path;

use crate::camera::config::CameraConfig;
use crate::camera::state::RuntimeState;
use crate::errors::CamError;
use crate::filesys::file::File;
use crate::orchestrator::Orchestrator;

/// Render the artifact for `cameras`, listed in index order
pub fn render(primary: usize, cameras: &[(RuntimeState, &CameraConfig)]) -> String {
    let word = cameras
        .get(primary)
        .map(|(state, _)| state.status_word().as_str())
        .unwrap_or("halted");

    let mut out = String::new();
    let _ = writeln!(out, "status={}", word);
    let _ = writeln!(out, "primary={}", primary);
    let _ = writeln!(out, "cameras={}", cameras.len());

    for (index, (state, config)) in cameras.iter().enumerate() {
        let flag = |on: bool| if on { "1" } else { "0" };
        let prefix = format!("cam{}", index);
        let _ = writeln!(out, "{}_status={}", prefix, state.status_word().as_str());
        let _ = writeln!(out, "{}_recording={}", prefix, flag(state.recording.is_active()));
        let _ = writeln!(out, "{}_preview={}", prefix, flag(state.preview_enabled));
        let _ = writeln!(out, "{}_motion={}", prefix, flag(state.motion_enabled));
        let _ = writeln!(out, "{}_motion_mode={}", prefix, state.motion_mode.as_str());
        let _ = writeln!(out, "{}_motion_state={}", prefix, state.motion_state.name());
        let _ = writeln!(out, "{}_solo_stream={}", prefix, state.solo_stream.as_str());
        let _ = writeln!(out, "{}_image_index={}", prefix, state.counters.image);
        let _ = writeln!(out, "{}_video_index={}", prefix, state.counters.video);
        let _ = writeln!(out, "{}_video_size={}", prefix, config.video);
        let _ = writeln!(out, "{}_image_size={}", prefix, config.image);
        let _ = writeln!(out, "{}_bitrate={}", prefix, config.video_bitrate);
        let _ = writeln!(out, "{}_quality={}", prefix, config.image_quality);
        let error = state
            .last_error
            .as_deref()
            .unwrap_or("")
            .replace(['\n', '\r'], " ");
        let _ = writeln!(out, "{}_error={}", prefix, error);
    }
    out
}

/// Snapshot every session and rewrite `path`
pub async fn write_status(path: &Path, orchestrator: &Orchestrator) -> Result<(), CamError> {
    let snapshots = orchestrator
        .sessions()
        .iter()
        .map(|session| (session.state(), session.config()))
        .collect::<Vec<_>>();
    let cameras = snapshots
        .iter()
        .map(|(state, config)| (state.clone(), config.as_ref()))
        .collect::<Vec<_>>();

    let contents = render(orchestrator.primary(), &cameras);
    File::new(path).write_atomic(contents.as_bytes()).await
}
