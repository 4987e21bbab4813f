//! Storage abstraction for the timeline tables.
//!
//! Every statement is scoped to one `fileid` except the maintenance and
//! reconciliation bulk statements. Nothing here relies on store-specific
//! upsert syntax; callers compose select-then-insert/update themselves.

use anyhow::Result;

use super::{DaySummary, LivePhotoPart, TimelineRecord};

/// Implemented by the SQLite and PostgreSQL backends.
pub trait IndexStore: Send + Sync {
    // === Connection Management ===

    /// Create tables and indexes if missing
    fn initialize(&self) -> Result<()>;

    // === Timeline rows ===

    /// Stored mtime of the timeline row for a file
    fn timeline_mtime(&self, file_id: i64) -> Result<Option<i64>>;

    fn get_record(&self, file_id: i64) -> Result<Option<TimelineRecord>>;

    /// Insert a new row. `object_id` is written as given; `orphan` starts false.
    fn insert_record(&self, record: &TimelineRecord) -> Result<()>;

    /// Rewrite the derived columns of an existing row, leaving `objectid` and
    /// `orphan` alone. Returns rows affected.
    fn update_record(&self, record: &TimelineRecord) -> Result<usize>;

    fn delete_record(&self, file_id: i64) -> Result<usize>;

    /// Non-orphaned day buckets with their item counts, newest first
    fn day_summaries(&self) -> Result<Vec<DaySummary>>;

    /// Non-orphaned rows of one day, newest first
    fn day_records(&self, day_id: i64) -> Result<Vec<TimelineRecord>>;

    // === Live photo rows ===

    /// Stored mtime of the live-photo side row for a file
    fn livephoto_mtime(&self, file_id: i64) -> Result<Option<i64>>;

    fn get_livephoto(&self, file_id: i64) -> Result<Option<LivePhotoPart>>;

    /// Non-orphaned motion clip carrying `live_id`
    fn livephoto_by_live_id(&self, live_id: &str) -> Result<Option<LivePhotoPart>>;

    fn insert_livephoto(&self, part: &LivePhotoPart) -> Result<()>;

    /// Rewrite `liveid` and `mtime`. Returns rows affected.
    fn update_livephoto(&self, part: &LivePhotoPart) -> Result<usize>;

    fn delete_livephoto(&self, file_id: i64) -> Result<usize>;

    // === Reconciliation ===

    /// Flag every row of both tables orphaned. Returns rows affected.
    fn orphan_all(&self) -> Result<usize>;

    /// Clear the orphan flag for one file in both tables.
    fn unorphan(&self, file_id: i64) -> Result<usize>;

    /// Delete every orphaned row of both tables.
    fn remove_orphans(&self) -> Result<usize>;

    // === Maintenance ===

    /// Empty both tables in one atomic step
    fn truncate(&self) -> Result<()>;
}
