//! One camera: configuration, runtime state and driver behind a single lock
//!
//! Every mutation goes through [`CameraSession::lock`]. The committed
//! configuration and runtime state are published on `watch` channels so
//! observers (status writer, preview) never see a half-applied restart.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::camera::config::{CameraConfig, MotionMode, Resolution, SoloStreamMode};
use crate::camera::driver::{
    CameraDriver, Controls, DriverConfig, EncoderSettings, Frame, MotionAnalyzer,
};
use crate::camera::media;
use crate::camera::state::{Lifecycle, RecordingState, RuntimeState};
use crate::command::action::{Action, RestartSetting, Setting};
use crate::command::parser::CommandCode;
use crate::errors::CamError;
use crate::filesys::dir::Dir;
use crate::motion::engine::{MotionEngine, RecordingIntent};
use crate::motion::monitor::MotionMonitor;
use crate::naming::counters::{MediaKind, SequenceCounters};
use crate::naming::template::{resolve, resolve_path, AnnotationSource, TemplateContext};
use crate::storage::logbook::ScheduleLog;
use crate::storage::user_config::UserConfig;

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bound on waiting for the lock and on each restart transaction
    pub restart_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            restart_timeout: Duration::from_secs(10),
        }
    }
}

/// Collaborators owned by a session
pub struct SessionDeps {
    pub driver: Box<dyn CameraDriver>,
    pub analyzer: Box<dyn MotionAnalyzer>,
    pub monitor: MotionMonitor,
}

/// A camera and everything it owns
pub struct CameraSession {
    index: usize,
    inner: Mutex<SessionInner>,
    config_rx: watch::Receiver<Arc<CameraConfig>>,
    state_rx: watch::Receiver<RuntimeState>,
    options: SessionOptions,
}

impl CameraSession {
    /// Load the layered configuration from `camera_file` and bring the camera up
    pub async fn open(
        index: usize,
        camera_file: Option<PathBuf>,
        deps: SessionDeps,
        options: SessionOptions,
    ) -> Result<Arc<Self>, CamError> {
        let config = CameraConfig::load_layered(camera_file.as_deref()).await?;
        Self::with_config(index, config, camera_file, deps, options).await
    }

    /// Bring the camera up with an already loaded configuration
    pub async fn with_config(
        index: usize,
        config: CameraConfig,
        camera_file: Option<PathBuf>,
        deps: SessionDeps,
        options: SessionOptions,
    ) -> Result<Arc<Self>, CamError> {
        let user_config = UserConfig::load(&config.user_config).await?;
        let counters = SequenceCounters::scan(&config.output_dirs()).await?;
        let runtime = RuntimeState {
            preview_enabled: config.show_preview,
            motion_mode: config.motion_mode,
            solo_stream: config.solo_stream,
            counters,
            ..RuntimeState::default()
        };
        let schedule = ScheduleLog::new(&config.log_file, config.log_size, index);

        let (config_tx, config_rx) = watch::channel(Arc::new(config.clone()));
        let (state_tx, state_rx) = watch::channel(runtime.clone());

        let session = Arc::new_cyclic(|weak| CameraSession {
            index,
            inner: Mutex::new(SessionInner {
                index,
                config: config.clone(),
                last_good: config,
                staged: Vec::new(),
                runtime,
                driver: deps.driver,
                analyzer: deps.analyzer,
                motion: MotionEngine::new(),
                monitor: deps.monitor,
                deadline: None,
                recording: None,
                generation: 0,
                camera_file,
                user_config,
                schedule,
                config_tx,
                state_tx,
                session: weak.clone(),
                restart_timeout: options.restart_timeout,
            }),
            config_rx,
            state_rx,
            options,
        });

        session.lock().await?.initialize().await?;
        Ok(session)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Acquire the session, waiting at most the restart timeout
    pub async fn lock(&self) -> Result<MutexGuard<'_, SessionInner>, CamError> {
        tokio::time::timeout(self.options.restart_timeout, self.inner.lock())
            .await
            .map_err(|_| CamError::RestartTimeout {
                camera: self.index,
                timeout: self.options.restart_timeout,
            })
    }

    /// Last committed configuration
    pub fn config(&self) -> Arc<CameraConfig> {
        self.config_rx.borrow().clone()
    }

    /// Last published runtime state
    pub fn state(&self) -> RuntimeState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_config(&self) -> watch::Receiver<Arc<CameraConfig>> {
        self.config_rx.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RuntimeState> {
        self.state_rx.clone()
    }

    async fn expire_recording(&self, generation: u64) {
        let mut inner = match self.lock().await {
            Ok(inner) => inner,
            Err(e) => {
                warn!("Camera {}: recording deadline could not stop recording: {}", self.index, e);
                return;
            }
        };
        if inner.recording.as_ref().map(|r| r.generation) != Some(generation) {
            return;
        }
        // Called from the deadline task itself, so the handle is dropped rather than aborted
        inner.deadline.take();
        info!("Camera {}: recording deadline reached", self.index);
        if let Err(e) = inner.stop_recording().await {
            error!("Camera {}: failed to stop recording at deadline: {}", self.index, e);
        }
    }
}

struct ActiveRecording {
    path: PathBuf,
    generation: u64,
}

/// Lock-protected part of a session
pub struct SessionInner {
    index: usize,
    config: CameraConfig,
    last_good: CameraConfig,
    staged: Vec<RestartSetting>,
    runtime: RuntimeState,
    driver: Box<dyn CameraDriver>,
    analyzer: Box<dyn MotionAnalyzer>,
    motion: MotionEngine,
    monitor: MotionMonitor,
    deadline: Option<AbortHandle>,
    recording: Option<ActiveRecording>,
    generation: u64,
    camera_file: Option<PathBuf>,
    user_config: UserConfig,
    schedule: ScheduleLog,
    config_tx: watch::Sender<Arc<CameraConfig>>,
    state_tx: watch::Sender<RuntimeState>,
    session: Weak<CameraSession>,
    restart_timeout: Duration,
}

impl SessionInner {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn schedule_log(&self) -> &ScheduleLog {
        &self.schedule
    }

    pub fn staged(&self) -> &[RestartSetting] {
        &self.staged
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    pub fn ensure_running(&self) -> Result<(), CamError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CamError::CameraStopped(self.index))
        }
    }

    async fn initialize(&mut self) -> Result<(), CamError> {
        make_output_dirs(&self.config).await?;
        if self.config.autostart {
            let config = self.config.clone();
            self.bring_up(&config).await.map_err(|e| {
                CamError::RestartFailed {
                    camera: self.index,
                    reason: e.to_string(),
                }
            })?;
            self.runtime.lifecycle = Lifecycle::Running;
            self.runtime.motion_enabled = self.config.motion_detection;
            self.schedule.record("Camera started").await;
        }
        info!(
            "Camera {}: initialized ({}), image {} video {}",
            self.index,
            if self.is_running() { "running" } else { "stopped" },
            self.config.image,
            self.config.video
        );
        self.publish_state();
        Ok(())
    }

    /// Execute one validated action; successful commands are persisted to
    /// the user config file
    pub async fn execute(
        &mut self,
        command: CommandCode,
        action: Action,
        param: &str,
    ) -> Result<(), CamError> {
        if !matches!(action, Action::Run(_)) {
            self.ensure_running()?;
        }

        let result = match action {
            Action::Run(true) => self.start().await,
            Action::Run(false) => self.stop().await,
            Action::DisplayPreview(enabled) => {
                self.set_preview(enabled);
                Ok(())
            }
            Action::StartRecording(duration) => self.start_recording(duration).await.map(|_| ()),
            Action::StopRecording => {
                if self.config.motion_mode == MotionMode::Internal {
                    self.motion.reset();
                }
                self.stop_recording().await.map(|_| ())
            }
            Action::Capture { max_res } => self.capture_still(max_res).await.map(|_| ()),
            Action::MotionDetection(enabled) => self.set_motion_detection(enabled).await,
            Action::Setting(setting) => self.apply_setting(setting).await,
            Action::Restart(setting) => self.apply_restart_setting(setting).await,
            Action::ResetConfig => self.reset_to_config_file().await,
            Action::ResyncCounters => self.resync_counters().await,
            Action::ChangePrimary(_) | Action::StitchedCapture { .. } | Action::Macro { .. } => {
                Err(CamError::Internal(format!(
                    "'{}' is not a per-camera command",
                    command
                )))
            }
        };

        if result.is_ok() {
            if let Err(e) = self.user_config.persist(command, param, &self.config).await {
                warn!("Camera {}: failed to persist '{}': {}", self.index, command, e);
            }
        }
        result
    }

    /// `ru 1`: start a stopped camera, or restart a running one with the
    /// user config re-read and staged settings applied
    pub async fn start(&mut self) -> Result<(), CamError> {
        if let Err(e) = self.user_config.reload().await {
            warn!("Camera {}: failed to reload user config: {}", self.index, e);
        }
        let mut candidate = self.config.clone();
        candidate.apply_entries(self.user_config.entries());
        candidate.normalize();

        if self.is_running() {
            return self.restart_transaction(candidate).await;
        }

        let candidate = self.apply_staged(candidate);
        if let Err(e) = self.bring_up(&candidate).await {
            let reason = e.to_string();
            error!("Camera {}: start failed: {}", self.index, reason);
            self.runtime.last_error = Some(reason.clone());
            self.publish_state();
            return Err(match e {
                CamError::RestartTimeout { .. } => e,
                _ => CamError::RestartFailed {
                    camera: self.index,
                    reason,
                },
            });
        }

        self.staged.clear();
        self.runtime.last_error = None;
        self.commit(candidate);
        self.runtime.lifecycle = Lifecycle::Running;
        self.runtime.motion_enabled = self.config.motion_detection;
        if let Err(e) = self.resync_counters().await {
            warn!("Camera {}: counter scan failed: {}", self.index, e);
        }
        self.schedule.record("Camera started").await;
        info!("Camera {}: started", self.index);
        self.publish_state();
        Ok(())
    }

    /// `ru 0`: finalize any recording and stop the stream
    pub async fn stop(&mut self) -> Result<(), CamError> {
        self.close_motion_cycle().await;
        if let Err(e) = self.stop_recording().await {
            warn!("Camera {}: failed to finalize recording: {}", self.index, e);
        }
        let result = if self.is_running() {
            self.driver.stop_stream().await
        } else {
            Ok(())
        };
        self.runtime.lifecycle = Lifecycle::Stopped;
        self.runtime.capturing_still = false;
        self.runtime.motion_enabled = false;
        self.analyzer.reset();
        self.schedule.record("Camera stopped").await;
        info!("Camera {}: stopped", self.index);
        self.publish_state();
        result
    }

    /// Update a setting that does not need a stream restart
    pub async fn apply_setting(&mut self, setting: Setting) -> Result<(), CamError> {
        let mut candidate = self.config.clone();
        if setting.apply_to(&mut candidate) {
            self.driver
                .set_controls(&Controls::from_camera(&candidate))
                .await?;
        }
        if let Setting::Annotation(text) = &setting {
            if text.is_empty() {
                self.driver.set_annotation(None).await?;
            }
        }
        self.runtime.motion_mode = candidate.motion_mode;
        self.commit(candidate);
        debug!("Camera {}: applied {:?}", self.index, setting);
        self.publish_state();
        Ok(())
    }

    /// Stage a restart-requiring change; applied now unless a recording is active
    pub async fn apply_restart_setting(&mut self, setting: RestartSetting) -> Result<(), CamError> {
        self.staged.push(setting);
        if self.runtime.recording.is_active() {
            info!(
                "Camera {}: recording in progress, change deferred until the next restart",
                self.index
            );
            self.schedule.record("Change deferred while recording").await;
            return Ok(());
        }
        self.restart_transaction(self.config.clone()).await
    }

    fn apply_staged(&self, mut candidate: CameraConfig) -> CameraConfig {
        let sensor = self.driver.sensor_resolution();
        for setting in &self.staged {
            setting.apply_to(&mut candidate, sensor);
        }
        candidate
    }

    /// Stop, reconfigure and restart with `candidate` plus staged settings.
    ///
    /// On failure the last known good configuration is restored and the
    /// committed configuration never changes.
    pub async fn restart_transaction(&mut self, candidate: CameraConfig) -> Result<(), CamError> {
        let candidate = self.apply_staged(candidate);
        if let Err(e) = self.stop_recording().await {
            warn!("Camera {}: failed to finalize recording before restart: {}", self.index, e);
        }
        if let Err(e) = self.driver.stop_stream().await {
            warn!("Camera {}: failed to stop stream: {}", self.index, e);
        }

        match self.bring_up(&candidate).await {
            Ok(()) => {
                self.staged.clear();
                self.runtime.last_error = None;
                self.runtime.lifecycle = Lifecycle::Running;
                self.commit(candidate);
                self.schedule.record("Camera restarted").await;
                info!("Camera {}: restarted", self.index);
                self.publish_state();
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Camera {}: restart failed, reverting: {}", self.index, reason);
                self.staged.clear();
                self.runtime.last_error = Some(reason.clone());
                self.revert().await;
                self.schedule
                    .record(&format!("Restart failed: {}", reason))
                    .await;
                self.publish_state();
                Err(match e {
                    CamError::RestartTimeout { .. } => e,
                    _ => CamError::RestartFailed {
                        camera: self.index,
                        reason,
                    },
                })
            }
        }
    }

    async fn revert(&mut self) {
        let _ = self.driver.stop_stream().await;
        let last_good = self.last_good.clone();
        match self.bring_up(&last_good).await {
            Ok(()) => {
                self.runtime.lifecycle = Lifecycle::Running;
                self.config = last_good;
                self.runtime.solo_stream = self.config.solo_stream;
            }
            Err(e) => {
                error!("Camera {}: could not restore previous configuration: {}", self.index, e);
                self.runtime.lifecycle = Lifecycle::Stopped;
            }
        }
    }

    /// Reconfigure, start and apply controls, bounded by the restart timeout
    async fn bring_up(&mut self, config: &CameraConfig) -> Result<(), CamError> {
        let sensor = self.driver.sensor_resolution();
        let stream = DriverConfig::from_camera(config, sensor);
        let controls = Controls::from_camera(config);
        let driver = self.driver.as_mut();
        let result = tokio::time::timeout(self.restart_timeout, async {
            driver.reconfigure(&stream).await?;
            driver.start_stream().await?;
            driver.set_controls(&controls).await
        })
        .await;
        match result {
            Ok(inner) => inner,
            Err(_) => Err(CamError::RestartTimeout {
                camera: self.index,
                timeout: self.restart_timeout,
            }),
        }
    }

    fn commit(&mut self, config: CameraConfig) {
        self.runtime.solo_stream = config.solo_stream;
        self.runtime.motion_mode = config.motion_mode;
        if config.solo_stream.is_on() {
            self.runtime.preview_enabled = false;
        }
        self.config = config;
        self.last_good = self.config.clone();
        self.config_tx.send_replace(Arc::new(self.config.clone()));
    }

    fn publish_state(&mut self) {
        self.runtime.motion_state = self.motion.state();
        self.state_tx.send_replace(self.runtime.clone());
    }

    /// Begin a recording, optionally stopping automatically after `duration`
    pub async fn start_recording(&mut self, duration: Option<Duration>) -> Result<PathBuf, CamError> {
        if self.runtime.recording.is_active() {
            return Err(CamError::AlreadyRecording(self.index));
        }
        let index = self.runtime.counters.video;
        let ctx = self
            .template_context()
            .await
            .with_indices(self.runtime.counters.image, index);
        let path = resolve_path(&self.config.video_path, &ctx)?;
        media::ensure_parent(&path).await?;

        self.driver
            .start_encoder(&path, &EncoderSettings::from_camera(&self.config))
            .await?;
        self.runtime.counters.take(MediaKind::Video);

        if let Err(e) = media::write_thumbnail(&self.config, &path, MediaKind::Video, index).await {
            warn!("Camera {}: thumbnail for {:?} failed: {}", self.index, path, e);
        }

        self.generation += 1;
        self.recording = Some(ActiveRecording {
            path: path.clone(),
            generation: self.generation,
        });
        self.runtime.recording = match duration {
            Some(after) => {
                self.arm_deadline(after, self.generation);
                RecordingState::ActiveWithDeadline(after)
            }
            None => RecordingState::Active,
        };

        info!("Camera {}: recording to {:?}", self.index, path);
        self.schedule
            .record(&format!("Capturing video to {}", path.display()))
            .await;
        self.publish_state();
        Ok(path)
    }

    fn arm_deadline(&mut self, after: Duration, generation: u64) {
        let session = self.session.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(session) = session.upgrade() {
                session.expire_recording(generation).await;
            }
        });
        self.deadline = Some(task.abort_handle());
    }

    /// Finalize the current recording; returns false if none was active
    pub async fn stop_recording(&mut self) -> Result<bool, CamError> {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
        let Some(recording) = self.recording.take() else {
            return Ok(false);
        };
        self.runtime.recording = RecordingState::Off;
        let result = self.driver.stop_encoder().await;
        self.publish_state();
        result?;

        info!("Camera {}: finalized {:?}", self.index, recording.path);
        self.schedule.record("Capture video stopped").await;
        Ok(true)
    }

    /// Capture and store one still image
    pub async fn capture_still(&mut self, max_res: bool) -> Result<PathBuf, CamError> {
        if max_res && self.runtime.recording.is_active() {
            self.stop_recording().await?;
        }
        self.runtime.capturing_still = true;
        self.publish_state();

        let result = self.capture_and_store(max_res).await;

        self.runtime.capturing_still = false;
        self.publish_state();
        if let Ok(path) = &result {
            self.schedule
                .record(&format!("Capturing image to {}", path.display()))
                .await;
        }
        result
    }

    async fn capture_and_store(&mut self, max_res: bool) -> Result<PathBuf, CamError> {
        let frame = if max_res {
            self.enter_max_resolution().await?;
            let captured = self.driver.capture_still().await;
            self.leave_max_resolution().await?;
            captured?
        } else {
            self.driver.capture_still().await?
        };

        let index = self.runtime.counters.take(MediaKind::Image);
        let path = self.image_output_path(index).await?;
        media::ensure_parent(&path).await?;
        media::write_jpeg(&path, frame.into_image()?, self.config.image_quality).await?;
        self.write_thumbnail(&path, MediaKind::Image, index).await;
        info!("Camera {}: captured {:?}", self.index, path);
        Ok(path)
    }

    /// Switch the stream to a single buffer at the sensor maximum
    pub async fn enter_max_resolution(&mut self) -> Result<(), CamError> {
        let stream = DriverConfig::max_resolution(&self.config, self.driver.sensor_resolution());
        let driver = self.driver.as_mut();
        let result = tokio::time::timeout(self.restart_timeout, async {
            driver.stop_stream().await?;
            driver.reconfigure(&stream).await?;
            driver.start_stream().await
        })
        .await;
        match result {
            Ok(Ok(())) => {
                self.runtime.solo_stream = SoloStreamMode::MaxRes;
                self.publish_state();
                Ok(())
            }
            Ok(Err(e)) => {
                self.revert().await;
                self.publish_state();
                Err(CamError::RestartFailed {
                    camera: self.index,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                self.revert().await;
                self.publish_state();
                Err(CamError::RestartTimeout {
                    camera: self.index,
                    timeout: self.restart_timeout,
                })
            }
        }
    }

    /// Return to the committed stream layout after a max-resolution capture
    pub async fn leave_max_resolution(&mut self) -> Result<(), CamError> {
        let _ = self.driver.stop_stream().await;
        let config = self.config.clone();
        let result = self.bring_up(&config).await;
        self.runtime.solo_stream = self.config.solo_stream;
        if let Err(e) = &result {
            error!("Camera {}: failed to leave max resolution: {}", self.index, e);
            self.runtime.last_error = Some(e.to_string());
            self.runtime.lifecycle = Lifecycle::Stopped;
        }
        self.publish_state();
        result
    }

    /// Capture from the main stream without storing
    pub async fn capture_frame(&mut self) -> Result<Frame, CamError> {
        self.driver.capture_still().await
    }

    /// Capture from the video/preview stream
    pub async fn capture_video_frame(&mut self) -> Result<Frame, CamError> {
        self.driver.capture_video_frame().await
    }

    pub fn set_capturing(&mut self, capturing: bool) {
        self.runtime.capturing_still = capturing;
        self.publish_state();
    }

    /// Next image index without consuming it
    pub fn next_image_index(&self) -> u32 {
        self.runtime.counters.image
    }

    pub fn skip_image_past(&mut self, used: u32) {
        self.runtime.counters.skip_image_past(used);
        self.publish_state();
    }

    /// Resolve the image template for `index`
    pub async fn image_output_path(&self, index: u32) -> Result<PathBuf, CamError> {
        let ctx = self
            .template_context()
            .await
            .with_indices(index, self.runtime.counters.video);
        Ok(resolve_path(&self.config.image_path, &ctx)?)
    }

    pub async fn write_thumbnail(&self, output: &Path, kind: MediaKind, index: u32) {
        if let Err(e) = media::write_thumbnail(&self.config, output, kind, index).await {
            warn!("Camera {}: thumbnail for {:?} failed: {}", self.index, output, e);
        }
    }

    pub fn set_preview(&mut self, enabled: bool) {
        let mut config = self.config.clone();
        config.show_preview = enabled;
        self.commit(config);
        self.runtime.preview_enabled = enabled;
        self.publish_state();
    }

    /// Turn motion detection on or off; switching off closes an open cycle
    pub async fn set_motion_detection(&mut self, enabled: bool) -> Result<(), CamError> {
        if enabled {
            if !self.runtime.motion_enabled {
                self.analyzer.reset();
                self.motion.reset();
            }
            self.runtime.motion_enabled = true;
            self.schedule.record("Motion detection started").await;
        } else {
            self.runtime.motion_enabled = false;
            self.close_motion_cycle().await;
            self.schedule.record("Motion detection stopped").await;
        }
        info!(
            "Camera {}: motion detection {}",
            self.index,
            if enabled { "enabled" } else { "disabled" }
        );
        self.publish_state();
        Ok(())
    }

    /// Score one frame and act on the engine's decision
    pub async fn sample_motion(&mut self) -> Result<Option<RecordingIntent>, CamError> {
        if !self.is_running() || !self.runtime.motion_enabled {
            return Ok(None);
        }
        let frame = self.driver.capture_video_frame().await?;
        let score = self.analyzer.score_frame(&frame);
        let before = self.motion.state();
        let intent = self.motion.on_score(score, &self.config.motion);
        if let Some(intent) = intent {
            debug!("Camera {}: motion score {:.2} -> {:?}", self.index, score, intent);
            self.handle_intent(intent).await;
        }
        if intent.is_some() || before != self.motion.state() {
            self.publish_state();
        }
        Ok(intent)
    }

    /// Return the engine to idle, emitting the stop for an open cycle
    async fn close_motion_cycle(&mut self) {
        if let Some(intent) = self.motion.disable() {
            self.handle_intent(intent).await;
        }
    }

    async fn handle_intent(&mut self, intent: RecordingIntent) {
        match (self.config.motion_mode, intent) {
            (MotionMode::Internal, RecordingIntent::StartRecording) => {
                match self.start_recording(None).await {
                    Ok(_) => {}
                    Err(CamError::AlreadyRecording(_)) => {
                        debug!("Camera {}: already recording on motion start", self.index)
                    }
                    Err(e) => warn!("Camera {}: motion recording failed: {}", self.index, e),
                }
            }
            (MotionMode::Internal, RecordingIntent::StopRecording) => {
                if let Err(e) = self.stop_recording().await {
                    warn!("Camera {}: failed to stop motion recording: {}", self.index, e);
                }
            }
            (MotionMode::Monitor, RecordingIntent::StartRecording) => {
                self.monitor.motion_started(self.index).await
            }
            (MotionMode::Monitor, RecordingIntent::StopRecording) => {
                self.monitor.motion_stopped(self.index).await
            }
        }
    }

    /// Restore the user config from the camera config file and restart
    pub async fn reset_to_config_file(&mut self) -> Result<(), CamError> {
        self.user_config
            .reset_from(self.camera_file.as_deref())
            .await?;
        let candidate = CameraConfig::load_layered(self.camera_file.as_deref()).await?;
        self.staged.clear();
        self.restart_transaction(candidate).await
    }

    /// Rescan output directories for sequence counters
    pub async fn resync_counters(&mut self) -> Result<(), CamError> {
        self.runtime.counters = SequenceCounters::scan(&self.config.output_dirs()).await?;
        info!(
            "Camera {}: counters image {} video {}",
            self.index, self.runtime.counters.image, self.runtime.counters.video
        );
        self.publish_state();
        Ok(())
    }

    /// Resolve the annotation template and hand it to the driver
    pub async fn refresh_annotation(&mut self) -> Result<(), CamError> {
        let text = if self.config.annotation.is_empty() {
            None
        } else {
            Some(resolve(&self.config.annotation, &self.template_context().await)?)
        };
        self.driver.set_annotation(text).await
    }

    async fn template_context(&self) -> TemplateContext {
        let annotation = AnnotationSource::from_file(&self.config.user_annotate).await;
        TemplateContext::new(self.index)
            .with_indices(self.runtime.counters.image, self.runtime.counters.video)
            .with_annotation(annotation)
    }

    /// Finalize recordings and release the driver
    pub async fn shutdown(&mut self) -> Result<(), CamError> {
        self.close_motion_cycle().await;
        if let Err(e) = self.stop_recording().await {
            warn!("Camera {}: failed to finalize recording: {}", self.index, e);
        }
        if self.is_running() {
            if let Err(e) = self.driver.stop_stream().await {
                warn!("Camera {}: failed to stop stream: {}", self.index, e);
            }
        }
        self.runtime.lifecycle = Lifecycle::Stopped;
        self.runtime.motion_enabled = false;
        self.publish_state();
        self.driver.close().await
    }

    pub fn sensor_resolution(&self) -> Resolution {
        self.driver.sensor_resolution()
    }
}

async fn make_output_dirs(config: &CameraConfig) -> Result<(), CamError> {
    for dir in config.output_dirs() {
        Dir::new(dir).create().await?;
    }
    media::ensure_parent(&config.preview_path).await?;
    Dir::new(&config.media_path).create().await
}
