//! File handles as seen by the index.
//!
//! The index never walks or mutates files itself; it only reads the few
//! attributes exposed by [`FileHandle`]. [`MediaFile`] is the local
//! filesystem implementation used by the scanner and the CLI.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Read-only view of a file in the store.
pub trait FileHandle: Send + Sync {
    /// Stable identifier of the file within the store.
    fn id(&self) -> i64;

    /// Modification time in epoch seconds.
    fn mtime(&self) -> i64;

    fn mime_type(&self) -> &str;

    /// Where extractors can read the file contents from.
    fn path(&self) -> &Path;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub id: i64,
    pub mtime: i64,
    pub mime: String,
    pub path: PathBuf,
}

impl MediaFile {
    /// Stat a file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(Self {
            id: file_id_for_path(path),
            mtime,
            mime: mime_for_path(path).to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Handle for a path that may no longer exist, enough to address its rows.
    pub fn detached(path: &Path) -> Self {
        Self {
            id: file_id_for_path(path),
            mtime: 0,
            mime: mime_for_path(path).to_string(),
            path: path.to_path_buf(),
        }
    }
}

impl FileHandle for MediaFile {
    fn id(&self) -> i64 {
        self.id
    }

    fn mtime(&self) -> i64 {
        self.mtime
    }

    fn mime_type(&self) -> &str {
        &self.mime
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Derive a stable, non-negative file id from the path.
///
/// The id survives the file being deleted, so `photoline remove` works on
/// paths that are already gone. A rename produces a new id.
pub fn file_id_for_path(path: &Path) -> i64 {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes) & i64::MAX
}

/// Guess the mime type from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" | "heif" => "image/heic",
        "cr2" | "nef" | "arw" | "dng" | "raf" | "orf" | "rw2" => "image/x-dcraw",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mpg" | "mpeg" => "video/mpeg",
        "mts" | "m2ts" => "video/MP2T",
        "3gp" => "video/3gpp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
