//! JPEG output and thumbnails

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::debug;

use crate::camera::config::CameraConfig;
use crate::errors::CamError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::naming::counters::{thumbnail_path, MediaKind};

/// Encode `image` as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CamError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(image)?;
    Ok(bytes)
}

/// Encode on the blocking pool and write atomically to `path`
pub async fn write_jpeg(path: &Path, image: RgbImage, quality: u8) -> Result<(), CamError> {
    let bytes = tokio::task::spawn_blocking(move || encode_jpeg(&image, quality))
        .await
        .map_err(|e| CamError::Internal(format!("jpeg encoder task failed: {}", e)))??;
    File::new(path).write_atomic(&bytes).await
}

/// Create the directory `path` will be written into
pub async fn ensure_parent(path: &Path) -> Result<(), CamError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Dir::new(parent).create().await,
        _ => Ok(()),
    }
}

/// Leave a thumbnail next to `output`, if thumbnails are enabled for `kind`.
///
/// The thumbnail is a copy of the current preview image, or a blank
/// preview-sized image when no preview exists yet.
pub async fn write_thumbnail(
    config: &CameraConfig,
    output: &Path,
    kind: MediaKind,
    index: u32,
) -> Result<(), CamError> {
    if !config.wants_thumbnail(kind.letter()) {
        return Ok(());
    }
    let thumbnail = thumbnail_path(output, kind, index);
    let preview = File::new(&config.preview_path);

    if preview.exists().await {
        preview.copy_to(&thumbnail).await?;
    } else {
        let blank = RgbImage::new(config.preview.width.max(1), config.preview.height.max(1));
        write_jpeg(&thumbnail, blank, config.preview.quality).await?;
    }
    debug!("Wrote thumbnail {:?}", thumbnail);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_thumbnail_falls_back_to_blank() {
        let dir = Dir::create_temp_dir("camd-media").await.unwrap();
        let mut config = CameraConfig::default();
        config.preview_path = dir.path().join("preview.jpg");
        config.thumb_gen = "i".to_string();
        let output = dir.path().join("im_0_3.jpg");

        write_thumbnail(&config, &output, MediaKind::Image, 3).await.unwrap();
        assert!(dir.file("im_0_3.jpg.i3.th.jpg").exists().await);

        write_thumbnail(&config, &output, MediaKind::Video, 3).await.unwrap();
        assert!(!dir.file("im_0_3.jpg.v3.th.jpg").exists().await);

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_thumbnail_copies_preview() {
        let dir = Dir::create_temp_dir("camd-media").await.unwrap();
        let mut config = CameraConfig::default();
        config.preview_path = dir.path().join("preview.jpg");
        dir.file("preview.jpg").write_atomic(b"preview").await.unwrap();

        let output = dir.path().join("vi_0_1.mp4");
        write_thumbnail(&config, &output, MediaKind::Video, 1).await.unwrap();
        let copied = dir.file("vi_0_1.mp4.v1.th.jpg").read_string().await.unwrap();
        assert_eq!(copied, "preview");

        dir.delete().await.unwrap();
    }
}
