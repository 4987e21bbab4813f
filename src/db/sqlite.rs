//! SQLite backend implementation.

use anyhow::{anyhow, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::schema::SCHEMA;
use super::{format_date, parse_date, DaySummary, IndexStore, LivePhotoPart, TimelineRecord};

const RECORD_COLUMNS: &str =
    "fileid, objectid, dayid, datetaken, mtime, isvideo, video_duration, w, h, exif, liveid, orphan";

/// How long a writer waits on another process holding the lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteDb {
    conn: Mutex<Connection>,
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TimelineRecord> {
    let date_taken: String = row.get(3)?;
    Ok(TimelineRecord {
        file_id: row.get(0)?,
        object_id: row.get(1)?,
        day_id: row.get(2)?,
        date_taken: parse_date(&date_taken),
        mtime: row.get(4)?,
        is_video: row.get(5)?,
        video_duration: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        exif: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        live_id: row.get(10)?,
        orphan: row.get(11)?,
    })
}

fn row_to_livephoto(row: &Row<'_>) -> rusqlite::Result<LivePhotoPart> {
    Ok(LivePhotoPart {
        file_id: row.get(0)?,
        live_id: row.get(1)?,
        mtime: row.get(2)?,
        orphan: row.get(3)?,
    })
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets concurrent scans read while one of them writes
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = ?path, journal_mode = %mode, "Opened SQLite index");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }
}

impl IndexStore for SqliteDb {
    fn initialize(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ========================================================================
    // Timeline rows
    // ========================================================================

    fn timeline_mtime(&self, file_id: i64) -> Result<Option<i64>> {
        let mtime = self
            .conn()?
            .query_row(
                "SELECT mtime FROM timeline WHERE fileid = ?",
                [file_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(mtime)
    }

    fn get_record(&self, file_id: i64) -> Result<Option<TimelineRecord>> {
        let record = self
            .conn()?
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM timeline WHERE fileid = ?"),
                [file_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_record(&self, record: &TimelineRecord) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO timeline (
                fileid, objectid, dayid, datetaken, mtime, isvideo,
                video_duration, w, h, exif, liveid
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                record.file_id,
                record.object_id,
                record.day_id,
                format_date(&record.date_taken),
                record.mtime,
                record.is_video,
                record.video_duration,
                record.width,
                record.height,
                record.exif,
                record.live_id,
            ],
        )?;
        Ok(())
    }

    fn update_record(&self, record: &TimelineRecord) -> Result<usize> {
        let affected = self.conn()?.execute(
            r#"
            UPDATE timeline SET
                dayid = ?, datetaken = ?, mtime = ?, isvideo = ?, video_duration = ?,
                w = ?, h = ?, exif = ?, liveid = ?
            WHERE fileid = ?
            "#,
            rusqlite::params![
                record.day_id,
                format_date(&record.date_taken),
                record.mtime,
                record.is_video,
                record.video_duration,
                record.width,
                record.height,
                record.exif,
                record.live_id,
                record.file_id,
            ],
        )?;
        Ok(affected)
    }

    fn delete_record(&self, file_id: i64) -> Result<usize> {
        let affected = self
            .conn()?
            .execute("DELETE FROM timeline WHERE fileid = ?", [file_id])?;
        Ok(affected)
    }

    fn day_summaries(&self) -> Result<Vec<DaySummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT dayid, COUNT(*)
            FROM timeline
            WHERE orphan = 0
            GROUP BY dayid
            ORDER BY dayid DESC
            "#,
        )?;
        let days = stmt
            .query_map([], |row| {
                Ok(DaySummary {
                    day_id: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }

    fn day_records(&self, day_id: i64) -> Result<Vec<TimelineRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM timeline \
             WHERE dayid = ? AND orphan = 0 \
             ORDER BY datetaken DESC, fileid DESC"
        ))?;
        let records = stmt
            .query_map([day_id], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // ========================================================================
    // Live photo rows
    // ========================================================================

    fn livephoto_mtime(&self, file_id: i64) -> Result<Option<i64>> {
        let mtime = self
            .conn()?
            .query_row(
                "SELECT mtime FROM timeline_livephoto WHERE fileid = ?",
                [file_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(mtime)
    }

    fn get_livephoto(&self, file_id: i64) -> Result<Option<LivePhotoPart>> {
        let part = self
            .conn()?
            .query_row(
                "SELECT fileid, liveid, mtime, orphan FROM timeline_livephoto WHERE fileid = ?",
                [file_id],
                row_to_livephoto,
            )
            .optional()?;
        Ok(part)
    }

    fn livephoto_by_live_id(&self, live_id: &str) -> Result<Option<LivePhotoPart>> {
        let part = self
            .conn()?
            .query_row(
                "SELECT fileid, liveid, mtime, orphan FROM timeline_livephoto \
                 WHERE liveid = ? AND orphan = 0 \
                 ORDER BY fileid LIMIT 1",
                [live_id],
                row_to_livephoto,
            )
            .optional()?;
        Ok(part)
    }

    fn insert_livephoto(&self, part: &LivePhotoPart) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO timeline_livephoto (fileid, liveid, mtime) VALUES (?, ?, ?)",
            rusqlite::params![part.file_id, part.live_id, part.mtime],
        )?;
        Ok(())
    }

    fn update_livephoto(&self, part: &LivePhotoPart) -> Result<usize> {
        let affected = self.conn()?.execute(
            "UPDATE timeline_livephoto SET liveid = ?, mtime = ? WHERE fileid = ?",
            rusqlite::params![part.live_id, part.mtime, part.file_id],
        )?;
        Ok(affected)
    }

    fn delete_livephoto(&self, file_id: i64) -> Result<usize> {
        let affected = self
            .conn()?
            .execute("DELETE FROM timeline_livephoto WHERE fileid = ?", [file_id])?;
        Ok(affected)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    fn orphan_all(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut affected = tx.execute("UPDATE timeline SET orphan = 1", [])?;
        affected += tx.execute("UPDATE timeline_livephoto SET orphan = 1", [])?;
        tx.commit()?;
        Ok(affected)
    }

    fn unorphan(&self, file_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let mut affected = conn.execute(
            "UPDATE timeline SET orphan = 0 WHERE fileid = ? AND orphan = 1",
            [file_id],
        )?;
        affected += conn.execute(
            "UPDATE timeline_livephoto SET orphan = 0 WHERE fileid = ? AND orphan = 1",
            [file_id],
        )?;
        Ok(affected)
    }

    fn remove_orphans(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut affected = tx.execute("DELETE FROM timeline WHERE orphan = 1", [])?;
        affected += tx.execute("DELETE FROM timeline_livephoto WHERE orphan = 1", [])?;
        tx.commit()?;
        Ok(affected)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    fn truncate(&self) -> Result<()> {
        // SQLite has no TRUNCATE; an unqualified DELETE uses the truncate optimization
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM timeline", [])?;
        tx.execute("DELETE FROM timeline_livephoto", [])?;
        tx.commit()?;
        Ok(())
    }
}
