//! Writing generated images to their destination paths

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};

/// Write image bytes to `path`, creating parent directories as needed
pub async fn write_image(path: &Path, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(AppError::RemoteCall(format!(
            "Refusing to write empty image to {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, data).await?;

    debug!(
        path = %path.display(),
        size = data.len(),
        format = detect_image_format(data).unwrap_or("unknown"),
        "Saved image file"
    );

    Ok(())
}

/// Read a reference image if it exists; a missing file is not an error
pub async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(fs::read(path).await?)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Locator for an image that only exists on local disk
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    None
}
