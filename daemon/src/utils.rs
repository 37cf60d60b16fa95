//! Utility functions

use std::path::Path;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::hardware::camera::list_cameras;
use crate::storage::settings::Settings;

/// Version information for the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

fn report(label: &str, ok: bool, detail: impl std::fmt::Display) {
    let mark = if ok { "✓".green() } else { "✗".red() };
    println!("  {} {:<20} {}", mark, label, detail);
}

/// Print host, device and path checks for the daemon described by `settings_path`
pub async fn run_diagnostic(settings_path: &Path) {
    let version = version_info();
    println!(
        "{} {} ({}, built {})",
        "camd".bold(),
        version.version,
        version.git_hash,
        version.build_time
    );

    println!("{}", "Host".bold());
    let mut sys = System::new_all();
    sys.refresh_all();
    let unknown = || "unknown".to_string();
    report("hostname", true, System::host_name().unwrap_or_else(unknown));
    report(
        "os",
        true,
        format!(
            "{} {} (kernel {})",
            System::name().unwrap_or_else(unknown),
            System::os_version().unwrap_or_else(unknown),
            System::kernel_version().unwrap_or_else(unknown)
        ),
    );
    report("cpus", !sys.cpus().is_empty(), sys.cpus().len());
    report(
        "memory",
        sys.total_memory() > 0,
        format!(
            "{} MiB used of {} MiB",
            sys.used_memory() / (1024 * 1024),
            sys.total_memory() / (1024 * 1024)
        ),
    );

    println!("{}", "Settings".bold());
    let settings = match Settings::load(settings_path).await {
        Ok(settings) => {
            report("settings", true, settings_path.display());
            settings
        }
        Err(e) => {
            report("settings", false, format!("{}: {}", settings_path.display(), e));
            Settings::default()
        }
    };

    println!("{}", "Cameras".bold());
    let detected = list_cameras();
    report("detected", !detected.is_empty(), format!("{:?}", detected));
    for (index, camera) in settings.cameras.iter().enumerate() {
        let present = Path::new(&camera.device).exists();
        report(&format!("camera {}", index), present, &camera.device);
        if let Some(config_file) = &camera.config_file {
            report(
                &format!("camera {} config", index),
                config_file.exists(),
                config_file.display(),
            );
        }
    }

    println!("{}", "Paths".bold());
    let parent_exists = |path: &Path| path.parent().map(Path::exists).unwrap_or(false);
    report(
        "control pipe dir",
        parent_exists(&settings.control_file),
        settings.control_file.display(),
    );
    report(
        "status file dir",
        parent_exists(&settings.status_file),
        settings.status_file.display(),
    );
    report(
        "macros dir",
        settings.macros_dir.is_dir(),
        settings.macros_dir.display(),
    );
}
