//! Periodic status artifact writer

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tracing::{error, info};

use crate::orchestrator::Orchestrator;
use crate::status::write_status;

/// Status worker options
#[derive(Debug, Clone)]
pub struct Options {
    pub status_file: PathBuf,
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            status_file: PathBuf::from("/tmp/status_mjpeg.txt"),
            interval: Duration::from_secs(1),
        }
    }
}

/// Run the status worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &Orchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Status worker starting...");

    loop {
        if let Err(e) = write_status(&options.status_file, orchestrator).await {
            error!("Failed to write status {:?}: {}", options.status_file, e);
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Status worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
