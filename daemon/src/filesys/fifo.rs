//! Named pipe helpers

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use tokio::fs;
use tokio::net::unix::pipe;
use tracing::{debug, info};

use crate::errors::CamError;

/// Create the FIFO at `path` (and its parent directory) unless it exists
pub async fn ensure_fifo(path: &Path) -> Result<(), CamError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.file_type().is_fifo() => return Ok(()),
        Ok(_) => {
            return Err(CamError::ConfigError(format!(
                "{:?} exists and is not a named pipe",
                path
            )))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| CamError::ConfigError(format!("invalid pipe path {:?}: {}", path, e)))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::AlreadyExists {
            return Err(err.into());
        }
    }
    info!("Created named pipe {:?}", path);
    Ok(())
}

/// Open the read end of a FIFO.
///
/// The pipe is opened read-write so that it never reports end-of-file when
/// the last writer closes.
pub fn open_receiver(path: &Path) -> Result<pipe::Receiver, CamError> {
    Ok(pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(path)?)
}

/// Write `message` to a FIFO without blocking.
///
/// Returns `Ok(false)` when no reader has the pipe open or the pipe is full.
pub fn write_nonblocking(path: &Path, message: &[u8]) -> Result<bool, CamError> {
    let sender = match pipe::OpenOptions::new().open_sender(path) {
        Ok(sender) => sender,
        Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
            debug!("No reader on {:?}, dropping message", path);
            return Ok(false);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    match sender.try_write(message) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::dir::Dir;

    #[tokio::test]
    async fn test_ensure_fifo_creates_once() {
        let dir = Dir::create_temp_dir("camd-fifo").await.unwrap();
        let path = dir.path().join("nested").join("FIFO");

        ensure_fifo(&path).await.unwrap();
        ensure_fifo(&path).await.unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.file_type().is_fifo());

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_regular_file_is_rejected() {
        let dir = Dir::create_temp_dir("camd-fifo").await.unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"x").unwrap();
        assert!(ensure_fifo(&path).await.is_err());
        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_without_reader_is_dropped() {
        let dir = Dir::create_temp_dir("camd-fifo").await.unwrap();
        let path = dir.path().join("motion");
        ensure_fifo(&path).await.unwrap();
        assert!(!write_nonblocking(&path, b"1").unwrap());
        dir.delete().await.unwrap();
    }
}
