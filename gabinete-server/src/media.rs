//! Uploaded media storage
//!
//! Images are decoded and re-encoded as JPEG so that every stored image has
//! the same format; audio is kept byte-for-byte. Returned paths are relative
//! to the data root and always use `/` separators.

use chrono::{DateTime, Utc};
use gabinete_common::config::RootFolderInitializer;
use gabinete_common::time::{file_stamp, now};
use gabinete_common::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// JPEG quality for re-encoded images
pub const JPEG_QUALITY: u8 = 92;

/// Extension used when an audio upload has none
pub const DEFAULT_AUDIO_EXT: &str = ".mp3";

const IMAGES_REL: &str = "uploads/images";
const AUDIO_REL: &str = "uploads/audio";

#[derive(Debug, Clone)]
pub struct MediaStore {
    layout: RootFolderInitializer,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            layout: RootFolderInitializer::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Decode an uploaded image and store it as JPEG
    pub fn save_image(&self, bytes: &[u8]) -> Result<String> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| Error::Media(format!("Unreadable image: {}", e)))?;
        let rgb = decoded.to_rgb8();

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| Error::Media(format!("Failed to encode image: {}", e)))?;

        let dir = self.layout.images_dir();
        fs::create_dir_all(&dir)?;
        let (name, path) = unique_name(&dir, "img", ".jpg", &now());
        fs::write(&path, &encoded)?;

        debug!("Stored image {} ({}x{})", name, rgb.width(), rgb.height());
        Ok(format!("{}/{}", IMAGES_REL, name))
    }

    /// Store an audio upload unchanged, keeping the original extension
    pub fn save_audio(&self, bytes: &[u8], original_name: Option<&str>) -> Result<String> {
        let ext = audio_extension(original_name);

        let dir = self.layout.audio_dir();
        fs::create_dir_all(&dir)?;
        let (name, path) = unique_name(&dir, "aud", &ext, &now());
        fs::write(&path, bytes)?;

        debug!("Stored audio {} ({} bytes)", name, bytes.len());
        Ok(format!("{}/{}", AUDIO_REL, name))
    }

    /// Delete a stored file; a path that is already gone is not an error
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self
            .resolve(relative)
            .ok_or_else(|| Error::Media(format!("Refusing to remove {}", relative)))?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute path for a stored relative path
    ///
    /// Returns `None` for absolute paths or paths that climb out of the root.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        safe.then(|| self.root().join(rel))
    }
}

/// Lowercase extension with leading dot, or the default
fn audio_extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_AUDIO_EXT.to_string())
}

/// `<prefix>_<stamp><ext>`, with a counter suffix if that name is taken
fn unique_name(dir: &Path, prefix: &str, ext: &str, at: &DateTime<Utc>) -> (String, PathBuf) {
    let stem = format!("{}_{}", prefix, file_stamp(at));
    let mut name = format!("{}{}", stem, ext);
    let mut n = 1;
    while dir.join(&name).exists() {
        name = format!("{}_{}{}", stem, n, ext);
        n += 1;
    }
    let path = dir.join(&name);
    (name, path)
}
