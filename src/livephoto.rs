//! Live photo pairing.
//!
//! A live photo is a still plus a short motion clip sharing an identifier.
//! The still is indexed normally and carries the identifier in its `liveid`;
//! the clip is kept out of the timeline and recorded in the side table, so
//! the pair is joined by value rather than by foreign key.

use anyhow::Result;
use std::sync::Arc;

use crate::db::{IndexStore, LivePhotoPart};
use crate::filestore::FileHandle;
use crate::metadata::{get_f64, get_str, Metadata};

/// Marker for motion photos whose video is appended to the still itself.
pub const SELF_TRAILER_ID: &str = "self__trailer";

pub struct LivePhotoLinker {
    db: Arc<dyn IndexStore>,
}

impl LivePhotoLinker {
    pub fn new(db: Arc<dyn IndexStore>) -> Self {
        Self { db }
    }

    /// Whether the metadata describes the motion clip of an Apple live photo.
    pub fn is_video_part(&self, metadata: &Metadata) -> bool {
        get_str(metadata, "MIMEType") == Some("video/quicktime")
            && get_str(metadata, "ContentIdentifier").is_some()
    }

    /// Shared pairing identifier, or an empty string.
    pub fn get_live_photo_id(&self, metadata: &Metadata) -> String {
        // Apple still
        if let Some(id) = get_str(metadata, "MediaGroupUUID") {
            return id.to_string();
        }

        // Apple motion clip
        if let Some(id) = get_str(metadata, "ContentIdentifier") {
            return id.to_string();
        }

        // Google and Samsung motion photos embed the clip after the image data
        if get_f64(metadata, "MicroVideoOffset").is_some_and(|offset| offset > 0.0) {
            return SELF_TRAILER_ID.to_string();
        }

        String::new()
    }

    /// Record a motion clip in the side table, updating it if already known.
    /// Returns whether the side table now holds a row for the clip.
    ///
    /// An insert failure means a concurrent scan got there first; it is
    /// logged and the next scan updates the row.
    pub fn link_video_part(&self, file: &dyn FileHandle, metadata: &Metadata) -> Result<bool> {
        let live_id = self.get_live_photo_id(metadata);
        if live_id.is_empty() {
            return Ok(false);
        }

        let part = LivePhotoPart {
            file_id: file.id(),
            live_id,
            mtime: file.mtime(),
            orphan: false,
        };

        if self.db.livephoto_mtime(part.file_id)?.is_some()
            && self.db.update_livephoto(&part)? > 0
        {
            return Ok(true);
        }

        if let Err(e) = self.db.insert_livephoto(&part) {
            tracing::warn!(
                file_id = part.file_id,
                live_id = %part.live_id,
                error = %e,
                "Failed to create live photo record"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::filestore::MediaFile;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn meta(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn linker(dir: &std::path::Path) -> LivePhotoLinker {
        let db = Database::open_sqlite(&dir.join("index.db")).unwrap();
        db.initialize().unwrap();
        LivePhotoLinker::new(Arc::new(db))
    }

    fn clip(id: i64, mtime: i64) -> MediaFile {
        MediaFile {
            id,
            mtime,
            mime: "video/quicktime".to_string(),
            path: PathBuf::from(format!("/photos/IMG_{id}.MOV")),
        }
    }

    #[test]
    fn test_is_video_part() {
        let dir = tempdir().unwrap();
        let linker = linker(dir.path());

        let part = meta(json!({ "MIMEType": "video/quicktime", "ContentIdentifier": "LP123" }));
        assert!(linker.is_video_part(&part));

        let plain_mov = meta(json!({ "MIMEType": "video/quicktime" }));
        assert!(!linker.is_video_part(&plain_mov));

        let mp4 = meta(json!({ "MIMEType": "video/mp4", "ContentIdentifier": "LP123" }));
        assert!(!linker.is_video_part(&mp4));
    }

    #[test]
    fn test_get_live_photo_id() {
        let dir = tempdir().unwrap();
        let linker = linker(dir.path());

        assert_eq!(linker.get_live_photo_id(&meta(json!({ "MediaGroupUUID": "LP123" }))), "LP123");
        assert_eq!(linker.get_live_photo_id(&meta(json!({ "ContentIdentifier": "LP9" }))), "LP9");
        assert_eq!(
            linker.get_live_photo_id(&meta(json!({ "MicroVideoOffset": 123456 }))),
            SELF_TRAILER_ID
        );
        assert_eq!(linker.get_live_photo_id(&meta(json!({ "MicroVideoOffset": 0 }))), "");
        assert_eq!(linker.get_live_photo_id(&Metadata::new()), "");
    }

    #[test]
    fn test_link_video_part_upserts() {
        let dir = tempdir().unwrap();
        let linker = linker(dir.path());
        let m = meta(json!({ "MIMEType": "video/quicktime", "ContentIdentifier": "LP123" }));

        assert!(linker.link_video_part(&clip(9, 100), &m).unwrap());
        assert!(linker.link_video_part(&clip(9, 200), &m).unwrap());

        let part = linker.db.get_livephoto(9).unwrap().unwrap();
        assert_eq!(part.live_id, "LP123");
        assert_eq!(part.mtime, 200);
    }

    #[test]
    fn test_copies_of_a_clip_are_both_linked() {
        let dir = tempdir().unwrap();
        let linker = linker(dir.path());
        let m = meta(json!({ "MIMEType": "video/quicktime", "ContentIdentifier": "LP123" }));

        linker.link_video_part(&clip(2, 100), &m).unwrap();
        linker.link_video_part(&clip(1, 100), &m).unwrap();

        assert!(linker.db.get_livephoto(1).unwrap().is_some());
        assert!(linker.db.get_livephoto(2).unwrap().is_some());
        assert_eq!(linker.db.livephoto_by_live_id("LP123").unwrap().unwrap().file_id, 1);
    }

    #[test]
    fn test_link_without_id_is_noop() {
        let dir = tempdir().unwrap();
        let linker = linker(dir.path());

        assert!(!linker.link_video_part(&clip(3, 1), &Metadata::new()).unwrap());
        assert!(linker.db.get_livephoto(3).unwrap().is_none());
    }
}
