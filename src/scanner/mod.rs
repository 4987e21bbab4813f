pub mod discovery;

use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use crate::config::ScannerConfig;
use crate::filestore::MediaFile;
use crate::index::{Classification, ProcessOutcome, TimelineIndex};

pub use discovery::discover_files;

#[derive(Debug, Clone)]
pub enum ScanProgress {
    Started { total_files: usize },
    Scanning { current: usize, total: usize, path: String },
    Completed { result: ScanResult },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Re-extract files whose mtime has not changed.
    pub force: bool,
    /// Orphan everything first and drop rows not seen during the walk.
    pub cleanup: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub found: usize,
    pub processed: usize,
    pub skipped: usize,
    pub not_indexable: usize,
    pub failed: usize,
    /// Unreadable entries met while listing the roots.
    pub walk_errors: usize,
    pub orphans_removed: usize,
}

#[derive(Default)]
struct Counters {
    done: AtomicUsize,
    processed: AtomicUsize,
    skipped: AtomicUsize,
    not_indexable: AtomicUsize,
    failed: AtomicUsize,
}

pub struct Scanner {
    index: Arc<TimelineIndex>,
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(index: Arc<TimelineIndex>, config: ScannerConfig) -> Self {
        Self { index, config }
    }

    /// Walk `roots` and index everything found.
    ///
    /// With `cleanup`, rows for files that were not seen are removed at the
    /// end. All roots are listed before anything is orphaned, so a missing
    /// root aborts the scan instead of wiping its files from the index, and
    /// a listing with unreadable entries indexes what it found but removes
    /// nothing.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        options: ScanOptions,
        progress_tx: Option<mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanResult> {
        let mut paths = Vec::new();
        let mut walk_errors = 0;
        for root in roots {
            let discovery = discover_files(root, self.config.follow_links)?;
            paths.extend(discovery.files);
            walk_errors += discovery.errors;
        }

        if options.cleanup && walk_errors > 0 {
            tracing::warn!(walk_errors, "Library listing incomplete, skipping orphan cleanup");
        }
        let options = ScanOptions {
            cleanup: options.cleanup && walk_errors == 0,
            ..options
        };

        let total = paths.len();
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ScanProgress::Started { total_files: total });
        }
        tracing::info!(roots = roots.len(), files = total, "Starting scan");

        if options.cleanup {
            self.index.orphan_all()?;
        }

        let counters = Counters::default();
        let work = || {
            paths.par_iter().for_each(|path| {
                self.scan_one(path, options, &counters, total, progress_tx.as_ref());
            });
        };
        match self.config.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(work),
            None => work(),
        }

        let orphans_removed = if options.cleanup {
            self.index.remove_orphans()?
        } else {
            0
        };

        let result = ScanResult {
            found: total,
            processed: counters.processed.into_inner(),
            skipped: counters.skipped.into_inner(),
            not_indexable: counters.not_indexable.into_inner(),
            failed: counters.failed.into_inner(),
            walk_errors,
            orphans_removed,
        };

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ScanProgress::Completed { result });
        }
        tracing::info!(
            processed = result.processed,
            skipped = result.skipped,
            failed = result.failed,
            orphans_removed = result.orphans_removed,
            "Scan complete"
        );

        Ok(result)
    }

    fn scan_one(
        &self,
        path: &Path,
        options: ScanOptions,
        counters: &Counters,
        total: usize,
        progress_tx: Option<&mpsc::Sender<ScanProgress>>,
    ) {
        let current = counters.done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(tx) = progress_tx {
            let _ = tx.send(ScanProgress::Scanning {
                current,
                total,
                path: path.to_string_lossy().to_string(),
            });
        }

        match self.index_path(path, options) {
            Ok(ProcessOutcome::Processed) => counters.processed.fetch_add(1, Ordering::Relaxed),
            Ok(ProcessOutcome::Skipped) => counters.skipped.fetch_add(1, Ordering::Relaxed),
            Ok(ProcessOutcome::NotIndexable) => {
                counters.not_indexable.fetch_add(1, Ordering::Relaxed)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to index file");
                if let Some(tx) = progress_tx {
                    let _ = tx.send(ScanProgress::Error {
                        message: format!("Error indexing {}: {}", path.display(), e),
                    });
                }
                counters.failed.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    fn index_path(&self, path: &Path, options: ScanOptions) -> Result<ProcessOutcome> {
        let file = MediaFile::from_path(path)?;
        if options.cleanup && self.index.classify(&file) != Classification::NotIndexable {
            self.index.unorphan(&file)?;
        }
        self.index.process_file(&file, options.force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, MetadataBackend, MetadataConfig, PreviewConfig};
    use crate::db::{Database, IndexStore};
    use crate::filestore::file_id_for_path;
    use crate::index::RecordState;
    use crate::metadata::build_extractor;
    use crate::preview::ImagePreview;
    use image::{ImageBuffer, Rgb};
    use std::fs::{self, File};
    use tempfile::{tempdir, TempDir};

    struct Library {
        dir: TempDir,
        index: Arc<TimelineIndex>,
    }

    impl Library {
        fn root(&self) -> PathBuf {
            self.dir.path().join("photos")
        }

        fn scanner(&self) -> Scanner {
            self.scanner_following_links(false)
        }

        fn scanner_following_links(&self, follow_links: bool) -> Scanner {
            let config = ScannerConfig {
                roots: vec![self.root()],
                follow_links,
                threads: Some(2),
            };
            Scanner::new(self.index.clone(), config)
        }

        fn state(&self, path: &Path) -> RecordState {
            self.index.state_of(file_id_for_path(path)).unwrap()
        }
    }

    fn library() -> Library {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("photos")).unwrap();

        let db = Database::open_sqlite(&dir.path().join("index.db")).unwrap();
        db.initialize().unwrap();
        let metadata = MetadataConfig {
            backend: MetadataBackend::Builtin,
            ..MetadataConfig::default()
        };
        let index = TimelineIndex::new(
            Arc::new(db),
            build_extractor(&metadata),
            Arc::new(ImagePreview::new(&PreviewConfig::default())),
            &IndexConfig::default(),
        );
        Library { dir, index: Arc::new(index) }
    }

    fn write_png(path: &Path) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 3, Rgb([200, 10, 10]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_scan_indexes_supported_files() {
        let lib = library();
        write_png(&lib.root().join("a.png"));
        write_png(&lib.root().join("b.png"));
        File::create(lib.root().join("readme.txt")).unwrap();

        let result = lib.scanner().scan(&[lib.root()], ScanOptions::default(), None).unwrap();
        assert_eq!(result.found, 3);
        assert_eq!(result.processed, 2);
        assert_eq!(result.not_indexable, 1);
        assert_eq!(result.failed, 0);

        let record = lib
            .index
            .record(file_id_for_path(&lib.root().join("a.png")))
            .unwrap()
            .unwrap();
        assert_eq!((record.width, record.height), (4, 3));
        assert!(!record.is_video);

        let again = lib.scanner().scan(&[lib.root()], ScanOptions::default(), None).unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(again.processed, 0);

        let forced = ScanOptions { force: true, cleanup: false };
        let forced = lib.scanner().scan(&[lib.root()], forced, None).unwrap();
        assert_eq!(forced.processed, 2);
    }

    #[test]
    fn test_cleanup_removes_vanished_files() {
        let lib = library();
        let keep = lib.root().join("keep.png");
        let gone = lib.root().join("gone.png");
        write_png(&keep);
        write_png(&gone);

        let options = ScanOptions { force: false, cleanup: true };
        lib.scanner().scan(&[lib.root()], options, None).unwrap();
        assert_eq!(lib.state(&gone), RecordState::Active);

        fs::remove_file(&gone).unwrap();
        let result = lib.scanner().scan(&[lib.root()], options, None).unwrap();

        assert_eq!(result.orphans_removed, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(lib.state(&keep), RecordState::Active);
        assert_eq!(lib.state(&gone), RecordState::Deleted);
    }

    #[cfg(unix)]
    #[test]
    fn test_incomplete_listing_skips_cleanup() {
        let lib = library();
        let keep = lib.root().join("keep.png");
        let gone = lib.root().join("gone.png");
        write_png(&keep);
        write_png(&gone);

        let options = ScanOptions { force: false, cleanup: true };
        lib.scanner().scan(&[lib.root()], options, None).unwrap();

        fs::remove_file(&gone).unwrap();
        // A directory loop makes the walk report an unreadable entry
        std::os::unix::fs::symlink(lib.root(), lib.root().join("loop")).unwrap();
        let result = lib.scanner_following_links(true).scan(&[lib.root()], options, None).unwrap();

        assert_eq!(result.walk_errors, 1);
        assert_eq!(result.orphans_removed, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(lib.state(&keep), RecordState::Active);
        assert_eq!(lib.state(&gone), RecordState::Active);
    }

    #[test]
    fn test_scan_without_cleanup_keeps_stale_rows() {
        let lib = library();
        let gone = lib.root().join("gone.png");
        write_png(&gone);

        lib.scanner().scan(&[lib.root()], ScanOptions::default(), None).unwrap();
        fs::remove_file(&gone).unwrap();
        let result = lib.scanner().scan(&[lib.root()], ScanOptions::default(), None).unwrap();

        assert_eq!(result.orphans_removed, 0);
        assert_eq!(lib.state(&gone), RecordState::Active);
    }

    #[test]
    fn test_missing_root_leaves_index_untouched() {
        let lib = library();
        let photo = lib.root().join("a.png");
        write_png(&photo);

        let options = ScanOptions { force: false, cleanup: true };
        lib.scanner().scan(&[lib.root()], options, None).unwrap();

        let missing = lib.dir.path().join("unmounted");
        assert!(lib.scanner().scan(&[lib.root(), missing], options, None).is_err());
        assert_eq!(lib.state(&photo), RecordState::Active);
    }

    #[test]
    fn test_progress_messages() {
        let lib = library();
        write_png(&lib.root().join("a.png"));

        let (tx, rx) = mpsc::channel();
        lib.scanner().scan(&[lib.root()], ScanOptions::default(), Some(tx)).unwrap();
        let messages: Vec<ScanProgress> = rx.iter().collect();

        assert!(matches!(messages.first(), Some(ScanProgress::Started { total_files: 1 })));
        assert!(matches!(
            messages.last(),
            Some(ScanProgress::Completed { result }) if result.processed == 1
        ));
    }
}
