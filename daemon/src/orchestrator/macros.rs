//! `sy` macro scripts

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::CamError;

/// Resolve `name` inside `macros_dir`, refusing anything that would leave it
pub async fn resolve_macro(macros_dir: &Path, name: &str) -> Result<PathBuf, CamError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(CamError::ValidationError(format!(
            "invalid macro name '{}'",
            name
        )));
    }

    let dir = tokio::fs::canonicalize(macros_dir).await.map_err(|e| {
        CamError::NotFound(format!("macros directory {:?}: {}", macros_dir, e))
    })?;
    let script = tokio::fs::canonicalize(dir.join(name))
        .await
        .map_err(|_| CamError::NotFound(format!("macro '{}'", name)))?;
    if !script.starts_with(&dir) {
        return Err(CamError::ValidationError(format!(
            "macro '{}' resolves outside {:?}",
            name, dir
        )));
    }

    let metadata = tokio::fs::metadata(&script).await?;
    if !metadata.is_file() {
        return Err(CamError::NotFound(format!("macro '{}' is not a file", name)));
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(CamError::MacroError(format!(
            "macro '{}' is not executable",
            name
        )));
    }
    Ok(script)
}

/// Run a macro script with `args` and wait for it to finish
pub async fn run_macro(macros_dir: &Path, name: &str, args: &[String]) -> Result<(), CamError> {
    let script = resolve_macro(macros_dir, name).await?;
    info!("Running macro {:?} {:?}", script, args);

    let output = Command::new(&script).args(args).output().await?;
    debug!(
        "Macro {} output: {}",
        name,
        String::from_utf8_lossy(&output.stdout).trim()
    );
    if !output.status.success() {
        return Err(CamError::MacroError(format!(
            "macro '{}' exited with {}: {}",
            name,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
