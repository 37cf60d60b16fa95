//! Motion sampling worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::CamError;
use crate::orchestrator::Orchestrator;

/// Motion worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between analyzed frames
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// Run the motion worker; one decision per frame per camera, in order
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &Orchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Motion worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Motion worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        for session in orchestrator.sessions() {
            let state = session.state();
            if !state.is_running() || !state.motion_enabled {
                continue;
            }
            let result = match session.lock().await {
                Ok(mut inner) => inner.sample_motion().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(Some(intent)) => debug!("Camera {}: {:?}", session.index(), intent),
                Ok(None) => {}
                Err(CamError::RestartTimeout { .. }) => {
                    debug!("Camera {}: busy, skipping motion sample", session.index())
                }
                Err(e) => warn!("Camera {}: motion sample failed: {}", session.index(), e),
            }
        }
    }
}
