//! Combined preview refresh worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::camera::config::CameraConfig;
use crate::orchestrator::Orchestrator;

/// Preview worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Used when the primary camera's frame rate gives no usable interval
    pub fallback_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fallback_interval: Duration::from_millis(100),
        }
    }
}

/// Refresh period: the video frame rate divided by the preview divider
pub fn frame_interval(config: &CameraConfig, fallback: Duration) -> Duration {
    if config.video_fps == 0 {
        return fallback;
    }
    let divider = config.preview.divider.max(1) as f64;
    Duration::from_secs_f64(divider / config.video_fps as f64)
}

/// Run the preview worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &Orchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Preview worker starting...");
    let mut excluded: Vec<usize> = Vec::new();

    loop {
        let interval = frame_interval(
            &orchestrator.primary_session().config(),
            options.fallback_interval,
        );
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Preview worker shutting down...");
                return;
            }
            _ = sleep_fn(interval) => {}
        }

        match orchestrator.refresh_preview().await {
            Ok(report) => {
                if report.excluded != excluded {
                    if !report.excluded.is_empty() {
                        warn!(
                            "Cameras {:?} left out of the preview: frame height differs from camera {:?}",
                            report.excluded,
                            report.included.first()
                        );
                    }
                    excluded = report.excluded;
                }
            }
            Err(e) => debug!("Preview refresh skipped: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        let mut config = CameraConfig::default();
        config.video_fps = 30;
        config.preview.divider = 3;
        assert_eq!(
            frame_interval(&config, Duration::from_secs(1)),
            Duration::from_millis(100)
        );

        config.video_fps = 0;
        assert_eq!(
            frame_interval(&config, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }
}
