//! Shared fixtures: a scripted camera driver and analyzer, and a session
//! rooted in a temporary directory

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use camd::camera::config::{CameraConfig, PreviewGeometry, Resolution};
use camd::camera::driver::{
    CameraDriver, Controls, DriverConfig, EncoderSettings, Frame, MotionAnalyzer,
};
use camd::camera::session::{CameraSession, SessionDeps, SessionOptions};
use camd::errors::CamError;
use camd::filesys::dir::Dir;
use camd::motion::monitor::MotionMonitor;
use camd::storage::logbook::MotionLog;

/// Everything the fake driver was asked to do
#[derive(Debug, Default)]
pub struct DriverLog {
    pub reconfigures: Vec<DriverConfig>,
    pub starts: usize,
    pub stops: usize,
    pub encoders_started: Vec<PathBuf>,
    pub encoders_stopped: usize,
    pub controls: Vec<Controls>,
    pub annotations: Vec<Option<String>>,
    pub stills: usize,
}

/// How the fake driver misbehaves
#[derive(Debug, Clone)]
pub struct DriverScript {
    pub sensor: Resolution,
    /// Refuse to reconfigure to this main stream size
    pub fail_main: Option<Resolution>,
    /// Stall reconfiguring to this main stream size
    pub slow_main: Option<Resolution>,
    pub slow_delay: Duration,
}

impl Default for DriverScript {
    fn default() -> Self {
        Self {
            sensor: Resolution::new(64, 48),
            fail_main: None,
            slow_main: None,
            slow_delay: Duration::from_secs(2),
        }
    }
}

pub struct FakeDriver {
    script: DriverScript,
    log: Arc<Mutex<DriverLog>>,
    stream: Option<DriverConfig>,
    streaming: bool,
    encoding: Option<PathBuf>,
}

impl FakeDriver {
    pub fn new(script: DriverScript) -> (Self, Arc<Mutex<DriverLog>>) {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let driver = Self {
            script,
            log: log.clone(),
            stream: None,
            streaming: false,
            encoding: None,
        };
        (driver, log)
    }

    fn not_streaming(&self) -> CamError {
        CamError::DriverError("stream is not running".to_string())
    }
}

#[async_trait]
impl CameraDriver for FakeDriver {
    async fn reconfigure(&mut self, config: &DriverConfig) -> Result<(), CamError> {
        self.log.lock().unwrap().reconfigures.push(config.clone());
        if self.streaming {
            return Err(CamError::DriverError("reconfigure while streaming".to_string()));
        }
        if self.script.slow_main == Some(config.main) {
            tokio::time::sleep(self.script.slow_delay).await;
        }
        if self.script.fail_main == Some(config.main) {
            return Err(CamError::DriverError(format!("unsupported size {}", config.main)));
        }
        self.stream = Some(config.clone());
        Ok(())
    }

    async fn start_stream(&mut self) -> Result<(), CamError> {
        if self.stream.is_none() {
            return Err(CamError::DriverError("not configured".to_string()));
        }
        self.streaming = true;
        self.log.lock().unwrap().starts += 1;
        Ok(())
    }

    async fn stop_stream(&mut self) -> Result<(), CamError> {
        if self.streaming {
            self.streaming = false;
            self.log.lock().unwrap().stops += 1;
        }
        Ok(())
    }

    async fn capture_still(&mut self) -> Result<Frame, CamError> {
        let stream = match (&self.stream, self.streaming) {
            (Some(stream), true) => stream,
            _ => return Err(self.not_streaming()),
        };
        self.log.lock().unwrap().stills += 1;
        Ok(Frame::blank(stream.main.width, stream.main.height))
    }

    async fn capture_video_frame(&mut self) -> Result<Frame, CamError> {
        let stream = match (&self.stream, self.streaming) {
            (Some(stream), true) => stream,
            _ => return Err(self.not_streaming()),
        };
        let size = stream.lores.unwrap_or(stream.main);
        Ok(Frame::blank(size.width, size.height))
    }

    async fn set_controls(&mut self, controls: &Controls) -> Result<(), CamError> {
        self.log.lock().unwrap().controls.push(controls.clone());
        Ok(())
    }

    async fn start_encoder(&mut self, path: &Path, _settings: &EncoderSettings) -> Result<(), CamError> {
        tokio::fs::write(path, b"").await?;
        self.encoding = Some(path.to_path_buf());
        self.log.lock().unwrap().encoders_started.push(path.to_path_buf());
        Ok(())
    }

    async fn stop_encoder(&mut self) -> Result<(), CamError> {
        if self.encoding.take().is_some() {
            self.log.lock().unwrap().encoders_stopped += 1;
        }
        Ok(())
    }

    async fn set_annotation(&mut self, text: Option<String>) -> Result<(), CamError> {
        self.log.lock().unwrap().annotations.push(text);
        Ok(())
    }

    fn sensor_resolution(&self) -> Resolution {
        self.script.sensor
    }

    async fn close(&mut self) -> Result<(), CamError> {
        self.streaming = false;
        Ok(())
    }
}

/// Returns queued scores in order, then zero
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    scores: VecDeque<f64>,
}

impl ScriptedAnalyzer {
    pub fn new(scores: &[f64]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
        }
    }
}

impl MotionAnalyzer for ScriptedAnalyzer {
    fn score_frame(&mut self, _frame: &Frame) -> f64 {
        self.scores.pop_front().unwrap_or(0.0)
    }

    fn reset(&mut self) {}
}

/// Small camera writing everything under `root`
pub fn test_config(root: &Path, index: usize) -> CameraConfig {
    let base = root.join(format!("cam{}", index));
    let mut config = CameraConfig::default();
    config.image_path = format!("{}/media/im_%I_%i.jpg", base.display());
    config.video_path = format!("{}/media/vi_%I_%v.mp4", base.display());
    config.media_path = base.join("media");
    config.preview_path = base.join("preview").join("cam.jpg");
    config.user_config = base.join(format!("uconfig_{}", index));
    config.log_file = base.join("scheduleLog.txt");
    config.motion_logfile = base.join("motionLog.txt");
    config.user_annotate = base.join("user_annotate.txt");
    config.thumb_gen = "iv".to_string();
    config.sensor_format = Resolution::new(64, 48);
    config.image = Resolution::new(64, 48);
    config.video = Resolution::new(32, 24);
    config.preview = PreviewGeometry {
        quality: 50,
        width: 32,
        height: 18,
        divider: 1,
    };
    config
}

/// A session together with the log of its fake driver
pub struct TestCamera {
    pub session: Arc<CameraSession>,
    pub log: Arc<Mutex<DriverLog>>,
}

pub async fn open_camera(
    root: &Path,
    index: usize,
    config: CameraConfig,
    script: DriverScript,
    scores: &[f64],
    restart_timeout: Duration,
) -> TestCamera {
    let (driver, log) = FakeDriver::new(script);
    let monitor = MotionMonitor::new(
        MotionLog::new(&config.motion_logfile),
        Some(root.join(format!("missing_pipe_{}", index))),
    );
    let deps = SessionDeps {
        driver: Box::new(driver),
        analyzer: Box::new(ScriptedAnalyzer::new(scores)),
        monitor,
    };
    let session = CameraSession::with_config(
        index,
        config,
        None,
        deps,
        SessionOptions { restart_timeout },
    )
    .await
    .unwrap();
    TestCamera { session, log }
}

/// One running camera with default behavior
pub async fn default_camera(dir: &Dir) -> TestCamera {
    open_camera(
        dir.path(),
        0,
        test_config(dir.path(), 0),
        DriverScript::default(),
        &[],
        Duration::from_secs(2),
    )
    .await
}
