//! Multi-camera orchestration
//!
//! The orchestrator owns every [`CameraSession`], routes parsed entries to
//! them and implements the commands that span cameras: stitched capture,
//! the combined preview, primary selection and macros.

pub mod macros;
pub mod preview;
pub mod stitch;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::camera::session::CameraSession;
use crate::command::action::Action;
use crate::command::parser::{parse_line, CommandBatch, CommandCode, CommandEntry, Target};
use crate::errors::CamError;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Directory holding `sy` scripts
    pub macros_dir: PathBuf,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            macros_dir: PathBuf::from("/var/www/html/macros"),
        }
    }
}

/// Outcome of one batch entry, in bracket order
#[derive(Debug)]
pub struct EntryOutcome {
    pub command: CommandCode,
    pub target: Target,
    pub result: Result<(), CamError>,
}

pub struct Orchestrator {
    sessions: Vec<Arc<CameraSession>>,
    primary: AtomicUsize,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        sessions: Vec<Arc<CameraSession>>,
        options: OrchestratorOptions,
    ) -> Result<Self, CamError> {
        if sessions.is_empty() {
            return Err(CamError::ConfigError("no cameras configured".to_string()));
        }
        Ok(Self {
            sessions,
            primary: AtomicUsize::new(0),
            options,
        })
    }

    pub fn sessions(&self) -> &[Arc<CameraSession>] {
        &self.sessions
    }

    pub fn session(&self, index: usize) -> Option<&Arc<CameraSession>> {
        self.sessions.get(index)
    }

    pub fn primary(&self) -> usize {
        self.primary.load(Ordering::SeqCst)
    }

    pub fn primary_session(&self) -> &Arc<CameraSession> {
        &self.sessions[self.primary().min(self.sessions.len() - 1)]
    }

    /// Parse and execute one command line; a parse error discards the line
    pub async fn execute_line(&self, line: &str) -> Result<Vec<EntryOutcome>, CamError> {
        let batch = parse_line(line).inspect_err(|e| {
            warn!("Discarding command line {:?}: {}", line.trim_end(), e);
        })?;
        Ok(self.execute(batch).await)
    }

    /// Execute every entry of `batch` in order; a failing entry does not
    /// affect the others
    pub async fn execute(&self, batch: CommandBatch) -> Vec<EntryOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for entry in batch {
            let result = self.execute_entry(&entry).await;
            match &result {
                Ok(()) => debug!("Executed {} '{}' on {:?}", entry.command, entry.param, entry.target),
                Err(e) if e.is_benign() => info!("{} on {:?}: {}", entry.command, entry.target, e),
                Err(e) => warn!("{} '{}' on {:?} failed: {}", entry.command, entry.param, entry.target, e),
            }
            outcomes.push(EntryOutcome {
                command: entry.command,
                target: entry.target,
                result,
            });
        }
        outcomes
    }

    async fn execute_entry(&self, entry: &CommandEntry) -> Result<(), CamError> {
        let action = Action::from_command(entry.command, &entry.param)?;
        match action {
            Action::ChangePrimary(index) => self.change_primary(index),
            Action::StitchedCapture { max_res, axis } => {
                let anchor = match entry.target {
                    Target::All { anchor } | Target::Camera(anchor) => anchor,
                    Target::Primary => self.primary(),
                };
                stitch::capture(&self.sessions, anchor, max_res, axis)
                    .await
                    .map(|_| ())
            }
            Action::Macro { name, args } => {
                macros::run_macro(&self.options.macros_dir, &name, &args).await
            }
            // A bare `ru` switches every camera
            Action::Run(_) if entry.target == Target::Primary => {
                let mut first_error = None;
                for index in 0..self.sessions.len() {
                    let result = self
                        .execute_on(index, entry.command, action.clone(), &entry.param)
                        .await;
                    if let Err(e) = result {
                        warn!("Camera {}: {} failed: {}", index, entry.command, e);
                        first_error.get_or_insert(e);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
            action => {
                let index = match entry.target {
                    Target::Primary => self.primary(),
                    Target::Camera(index) | Target::All { anchor: index } => index,
                };
                self.execute_on(index, entry.command, action, &entry.param)
                    .await
            }
        }
    }

    async fn execute_on(
        &self,
        index: usize,
        command: CommandCode,
        action: Action,
        param: &str,
    ) -> Result<(), CamError> {
        let session = self
            .sessions
            .get(index)
            .ok_or_else(|| CamError::NotFound(format!("camera {}", index)))?;
        let mut inner = session.lock().await?;
        inner
            .schedule_log()
            .record(&format!(
                "Attempted to execute '{}' with parameters ({})",
                command, param
            ))
            .await;
        inner.execute(command, action, param).await
    }

    fn change_primary(&self, index: usize) -> Result<(), CamError> {
        if index >= self.sessions.len() {
            return Err(CamError::ValidationError(format!(
                "camera {} does not exist ({} configured)",
                index,
                self.sessions.len()
            )));
        }
        self.primary.store(index, Ordering::SeqCst);
        info!("Primary camera is now {}", index);
        Ok(())
    }

    /// Rewrite the combined preview image
    pub async fn refresh_preview(&self) -> Result<preview::PreviewReport, CamError> {
        preview::refresh(&self.sessions, self.primary()).await
    }

    /// Stop every camera, finalizing recordings, in index order
    pub async fn shutdown(&self) -> Result<(), CamError> {
        let mut first_error = None;
        for session in &self.sessions {
            let result = match session.lock().await {
                Ok(mut inner) => inner.shutdown().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!("Camera {}: shutdown failed: {}", session.index(), e);
                first_error.get_or_insert(e);
            }
        }
        info!("All cameras shut down");
        first_error.map_or(Ok(()), Err)
    }
}
