//! The timeline index: classification, upsert, deletion and reconciliation.
//!
//! The store has no portable insert-or-update, so every write is a select
//! followed by either an update or an insert. Two scans racing on the same
//! file can both decide to insert; the loser's duplicate-key error is logged
//! and the next scan turns it into an update. The index is a rebuildable
//! cache, so that window is accepted instead of locking.

pub mod lifecycle;

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::db::{DaySummary, IndexStore, LivePhotoPart, TimelineRecord};
use crate::filestore::FileHandle;
use crate::livephoto::LivePhotoLinker;
use crate::metadata::{Metadata, MetadataExtractor};
use crate::normalize::RecordNormalizer;
use crate::preview::PreviewCapability;

pub use lifecycle::RecordState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NotIndexable,
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not a supported photo or video; the store was not touched.
    NotIndexable,
    /// Already indexed with the same mtime.
    Skipped,
    Processed,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::NotIndexable => "not_indexable",
            ProcessOutcome::Skipped => "skipped",
            ProcessOutcome::Processed => "processed",
        }
    }
}

/// Where an existing row for a file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriorRow {
    Timeline { mtime: i64 },
    LivePart { mtime: i64 },
}

impl PriorRow {
    fn mtime(&self) -> i64 {
        match self {
            PriorRow::Timeline { mtime } | PriorRow::LivePart { mtime } => *mtime,
        }
    }
}

pub struct TimelineIndex {
    db: Arc<dyn IndexStore>,
    extractor: Arc<dyn MetadataExtractor>,
    preview: Arc<dyn PreviewCapability>,
    livephoto: LivePhotoLinker,
    normalizer: RecordNormalizer,
    image_mimes: HashSet<String>,
    video_mimes: HashSet<String>,
}

impl TimelineIndex {
    pub fn new(
        db: Arc<dyn IndexStore>,
        extractor: Arc<dyn MetadataExtractor>,
        preview: Arc<dyn PreviewCapability>,
        config: &IndexConfig,
    ) -> Self {
        Self {
            livephoto: LivePhotoLinker::new(db.clone()),
            normalizer: RecordNormalizer::from_config(config),
            image_mimes: config.image_mimes.iter().cloned().collect(),
            video_mimes: config.video_mimes.iter().cloned().collect(),
            db,
            extractor,
            preview,
        }
    }

    /// Decide whether a file is an indexable image or video.
    ///
    /// Images also need preview support; without it they could never be
    /// shown in the timeline.
    pub fn classify(&self, file: &dyn FileHandle) -> Classification {
        let mime = file.mime_type();
        if self.image_mimes.contains(mime) {
            if !self.preview.is_mime_supported(mime) {
                return Classification::NotIndexable;
            }
            return Classification::Image;
        }
        if self.video_mimes.contains(mime) {
            return Classification::Video;
        }
        Classification::NotIndexable
    }

    /// Index one file, skipping it if its mtime is unchanged unless `force`.
    ///
    /// Unreadable metadata is not an error: the file is indexed from its
    /// attributes alone. Only store failures are returned.
    pub fn process_file(&self, file: &dyn FileHandle, force: bool) -> Result<ProcessOutcome> {
        let is_video = match self.classify(file) {
            Classification::NotIndexable => return Ok(ProcessOutcome::NotIndexable),
            Classification::Image => false,
            Classification::Video => true,
        };

        let file_id = file.id();
        let prior = self.prior_row(file_id)?;
        if let Some(prior) = prior {
            if !force && prior.mtime() == file.mtime() {
                return Ok(ProcessOutcome::Skipped);
            }
        }

        let metadata = match self.extractor.extract(file) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(
                    file_id,
                    path = %file.path().display(),
                    error = %e,
                    "Metadata extraction failed, indexing with defaults"
                );
                Metadata::new()
            }
        };

        if is_video && self.livephoto.is_video_part(&metadata) {
            let linked = self.livephoto.link_video_part(file, &metadata)?;
            if linked && matches!(prior, Some(PriorRow::Timeline { .. })) {
                // Was indexed as a plain video before its pair was recognized
                self.db.delete_record(file_id)?;
            }
            tracing::debug!(file_id, "Linked live photo video part");
            return Ok(ProcessOutcome::Processed);
        }

        let live_id = self.livephoto.get_live_photo_id(&metadata);
        let record = self.normalizer.build(file, is_video, metadata, live_id);
        self.upsert(&record, prior)?;

        tracing::debug!(file_id, day_id = record.day_id, "Indexed file");
        Ok(ProcessOutcome::Processed)
    }

    fn prior_row(&self, file_id: i64) -> Result<Option<PriorRow>> {
        if let Some(mtime) = self.db.timeline_mtime(file_id)? {
            return Ok(Some(PriorRow::Timeline { mtime }));
        }
        // A video may so far be known only as the motion part of a live photo
        Ok(self
            .db
            .livephoto_mtime(file_id)?
            .map(|mtime| PriorRow::LivePart { mtime }))
    }

    fn upsert(&self, record: &TimelineRecord, prior: Option<PriorRow>) -> Result<()> {
        match prior {
            Some(PriorRow::Timeline { .. }) => {
                if self.db.update_record(record)? == 0 {
                    // Row vanished between select and update
                    self.insert_or_log(record);
                }
            }
            Some(PriorRow::LivePart { .. }) => {
                self.db.delete_livephoto(record.file_id)?;
                self.insert_or_log(record);
            }
            None => self.insert_or_log(record),
        }
        Ok(())
    }

    fn insert_or_log(&self, record: &TimelineRecord) {
        if let Err(e) = self.db.insert_record(record) {
            tracing::warn!(
                file_id = record.file_id,
                error = %e,
                "Failed to create timeline record"
            );
        }
    }

    /// Remove a file from both tables. Returns rows removed; 0 if it was
    /// never indexed.
    pub fn delete_file(&self, file: &dyn FileHandle) -> Result<usize> {
        let file_id = file.id();
        let removed = self.db.delete_record(file_id)? + self.db.delete_livephoto(file_id)?;
        if removed > 0 {
            tracing::debug!(file_id, removed, "Removed file from index");
        }
        Ok(removed)
    }

    /// Empty the whole index. Does not ask for confirmation.
    pub fn clear(&self) -> Result<()> {
        self.db.truncate()?;
        tracing::info!("Cleared timeline index");
        Ok(())
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Flag every row as orphaned at the start of a full scan.
    pub fn orphan_all(&self) -> Result<usize> {
        let count = self.db.orphan_all()?;
        tracing::info!(count, "Marked all indexed files as orphaned");
        Ok(count)
    }

    /// Mark a file as confirmed present during the current scan.
    pub fn unorphan(&self, file: &dyn FileHandle) -> Result<usize> {
        self.db.unorphan(file.id())
    }

    /// Delete rows still orphaned at the end of a full scan.
    pub fn remove_orphans(&self) -> Result<usize> {
        let count = self.db.remove_orphans()?;
        tracing::info!(count, "Removed orphaned files from index");
        Ok(count)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Day buckets with item counts, newest first. Orphans are hidden.
    pub fn days(&self) -> Result<Vec<DaySummary>> {
        self.db.day_summaries()
    }

    /// Items of one day, newest first. Orphans are hidden.
    pub fn day(&self, day_id: i64) -> Result<Vec<TimelineRecord>> {
        self.db.day_records(day_id)
    }

    /// Raw row for a file, including orphaned ones.
    pub fn record(&self, file_id: i64) -> Result<Option<TimelineRecord>> {
        self.db.get_record(file_id)
    }

    pub fn live_photo_part(&self, file_id: i64) -> Result<Option<LivePhotoPart>> {
        self.db.get_livephoto(file_id)
    }

    /// Motion clip paired with a still's `live_id`.
    pub fn live_video_for(&self, live_id: &str) -> Result<Option<LivePhotoPart>> {
        if live_id.is_empty() {
            return Ok(None);
        }
        self.db.livephoto_by_live_id(live_id)
    }

    pub fn state_of(&self, file_id: i64) -> Result<RecordState> {
        let record = self.db.get_record(file_id)?;
        let part = match record {
            Some(_) => None,
            None => self.db.get_livephoto(file_id)?,
        };
        Ok(RecordState::of(record.as_ref(), part.as_ref()))
    }
}
