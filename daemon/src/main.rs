//! camd - Entry Point
//!
//! Multi-camera command and state daemon. Reads commands from a named pipe,
//! drives one session per camera and publishes a status file.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::bail;
use camd::app::options::{AppOptions, StorageOptions};
use camd::app::run::run;
use camd::hardware::camera::list_cameras;
use camd::logs::{init_logging, LogOptions};
use camd::storage::layout::StorageLayout;
use camd::storage::settings::{CameraSettings, Settings};
use camd::utils::{run_diagnostic, version_info};

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    let layout = StorageLayout::default();
    let settings_path = cli_args
        .get("settings")
        .map(PathBuf::from)
        .unwrap_or_else(|| layout.settings_file().path().to_path_buf());

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        run_diagnostic(&settings_path).await;
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings = match Settings::load(&settings_path).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file {:?}: {}", settings_path, e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let cameras = match resolve_cameras(&settings) {
        Ok(cameras) => cameras,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the daemon
    let options = AppOptions {
        storage: StorageOptions {
            layout: StorageLayout::new(
                settings_path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| layout.base_dir.clone()),
            ),
        },
        ..AppOptions::from_settings(&settings, cameras)
    };

    info!("Running camd {} with options: {:?}", version.version, options);
    match run(version.version, options, await_shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Camera daemon failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Configured camera slots, or every detected device when none are configured
fn resolve_cameras(settings: &Settings) -> anyhow::Result<Vec<CameraSettings>> {
    if !settings.cameras.is_empty() {
        return Ok(settings.cameras.clone());
    }
    let detected = list_cameras();
    if detected.is_empty() {
        bail!("No cameras configured and none detected under /dev/video*");
    }
    info!("Detected cameras: {:?}", detected);
    Ok(detected.into_iter().map(CameraSettings::for_device).collect())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
