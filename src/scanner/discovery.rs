use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    /// Entries the walk could not read. Files below them are missing from
    /// `files`, so the listing is incomplete.
    pub errors: usize,
}

/// Every regular file under `root`. Classification is left to the index so
/// the scan can confirm files whose mime it would later reject.
pub fn discover_files(root: &Path, follow_links: bool) -> Result<Discovery> {
    if !root.is_dir() {
        bail!("Library root is not a directory: {}", root.display());
    }

    let mut discovery = Discovery::default();

    for entry in WalkDir::new(root).follow_links(follow_links) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => discovery.files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable entry");
                discovery.errors += 1;
            }
        }
    }

    // Sort by path for consistent ordering
    discovery.files.sort();

    Ok(discovery)
}
