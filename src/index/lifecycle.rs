//! Row lifecycle during reconciliation.
//!
//! Transitions:
//! - Active -> Orphaned: `orphan_all` at the start of a full scan
//! - Orphaned -> Active: `unorphan` when the scan confirms the file
//! - Orphaned -> Deleted: `remove_orphans` at the end of the scan
//! - any -> Deleted: `delete_file` or `clear`
//! - Deleted -> Active: `process_file` inserting a fresh row
//!
//! `Active` rows are visible to queries; `Orphaned` rows still exist but are
//! hidden until a scan either confirms or removes them. A scan interrupted
//! between `orphan_all` and `remove_orphans` leaves extra `Orphaned` rows,
//! never lost ones.

use crate::db::{LivePhotoPart, TimelineRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Active,
    Orphaned,
    Deleted,
}

impl RecordState {
    pub fn from_orphan_flag(orphan: bool) -> Self {
        if orphan {
            RecordState::Orphaned
        } else {
            RecordState::Active
        }
    }

    /// State of a file given whatever rows it has in the two tables.
    pub fn of(record: Option<&TimelineRecord>, part: Option<&LivePhotoPart>) -> Self {
        match (record, part) {
            (Some(r), _) => Self::from_orphan_flag(r.orphan),
            (None, Some(p)) => Self::from_orphan_flag(p.orphan),
            (None, None) => RecordState::Deleted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Active => "active",
            RecordState::Orphaned => "orphaned",
            RecordState::Deleted => "deleted",
        }
    }
}
