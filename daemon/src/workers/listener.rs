//! Command channel listener
//!
//! Reads one command line at a time from the control FIFO. A line is fully
//! executed, and the status artifact rewritten, before the next is read.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::errors::CamError;
use crate::filesys::fifo;
use crate::orchestrator::Orchestrator;
use crate::status::write_status;

/// Listener worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Control FIFO
    pub control_file: PathBuf,

    /// Status artifact rewritten after every line
    pub status_file: PathBuf,

    /// Wait before reopening the pipe after an error
    pub retry_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            control_file: PathBuf::from("/tmp/FIFO"),
            status_file: PathBuf::from("/tmp/status_mjpeg.txt"),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Run the listener worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &Orchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Command listener starting on {:?}...", options.control_file);

    loop {
        let receiver = match open(options).await {
            Ok(receiver) => receiver,
            Err(e) => {
                error!("Unable to open control pipe {:?}: {}", options.control_file, e);
                tokio::select! {
                    _ = &mut shutdown_signal => {
                        info!("Command listener shutting down...");
                        return;
                    }
                    _ = sleep_fn(options.retry_delay) => continue,
                }
            }
        };
        let mut lines = BufReader::new(receiver).lines();

        loop {
            let next = tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Command listener shutting down...");
                    return;
                }
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) => handle_line(options, orchestrator, &line).await,
                Ok(None) => {
                    debug!("Control pipe closed, reopening");
                    break;
                }
                Err(e) => {
                    warn!("Error reading control pipe: {}", e);
                    sleep_fn(options.retry_delay).await;
                    break;
                }
            }
        }
    }
}

async fn open(options: &Options) -> Result<tokio::net::unix::pipe::Receiver, CamError> {
    fifo::ensure_fifo(&options.control_file).await?;
    fifo::open_receiver(&options.control_file)
}

/// Execute one command line and refresh the status artifact
pub async fn handle_line(options: &Options, orchestrator: &Orchestrator, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    info!("Command: {}", line.trim_end());

    // Parse errors are logged by the orchestrator
    if let Ok(outcomes) = orchestrator.execute_line(line).await {
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            debug!("{} of {} entries failed", failed, outcomes.len());
        }
    }

    if let Err(e) = write_status(&options.status_file, orchestrator).await {
        error!("Failed to write status {:?}: {}", options.status_file, e);
    }
}
