//! PostgreSQL backend implementation.

use anyhow::Result;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use super::postgres_schema::POSTGRES_SCHEMA;
use super::{format_date, parse_date, DaySummary, IndexStore, LivePhotoPart, TimelineRecord};

const RECORD_COLUMNS: &str =
    "fileid, objectid, dayid, datetaken, mtime, isvideo, video_duration, w, h, exif, liveid, orphan";

pub struct PgDb {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

/// Helper to parse a postgres Row into a TimelineRecord.
fn row_to_record(row: &postgres::Row) -> TimelineRecord {
    let date_taken: String = row.get(3);
    let width: i64 = row.get(7);
    let height: i64 = row.get(8);
    let exif: Option<String> = row.get(9);
    TimelineRecord {
        file_id: row.get(0),
        object_id: row.get(1),
        day_id: row.get(2),
        date_taken: parse_date(&date_taken),
        mtime: row.get(4),
        is_video: row.get(5),
        video_duration: row.get(6),
        width: u32::try_from(width).unwrap_or(0),
        height: u32::try_from(height).unwrap_or(0),
        exif: exif.unwrap_or_default(),
        live_id: row.get(10),
        orphan: row.get(11),
    }
}

fn row_to_livephoto(row: &postgres::Row) -> LivePhotoPart {
    LivePhotoPart {
        file_id: row.get(0),
        live_id: row.get(1),
        mtime: row.get(2),
        orphan: row.get(3),
    }
}

impl PgDb {
    pub fn open(url: &str, pool_size: u32) -> Result<Self> {
        let manager = PostgresConnectionManager::new(url.parse()?, NoTls);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;
        Ok(Self { pool })
    }
}

impl IndexStore for PgDb {
    fn initialize(&self) -> Result<()> {
        let mut client = self.pool.get()?;
        client.batch_execute(POSTGRES_SCHEMA)?;
        Ok(())
    }

    // ========================================================================
    // Timeline rows
    // ========================================================================

    fn timeline_mtime(&self, file_id: i64) -> Result<Option<i64>> {
        let mut client = self.pool.get()?;
        let row = client.query_opt("SELECT mtime FROM timeline WHERE fileid = $1", &[&file_id])?;
        Ok(row.map(|r| r.get(0)))
    }

    fn get_record(&self, file_id: i64) -> Result<Option<TimelineRecord>> {
        let mut client = self.pool.get()?;
        let row = client.query_opt(
            &format!("SELECT {RECORD_COLUMNS} FROM timeline WHERE fileid = $1"),
            &[&file_id],
        )?;
        Ok(row.as_ref().map(row_to_record))
    }

    fn insert_record(&self, record: &TimelineRecord) -> Result<()> {
        let mut client = self.pool.get()?;
        client.execute(
            r#"
            INSERT INTO timeline (
                fileid, objectid, dayid, datetaken, mtime, isvideo,
                video_duration, w, h, exif, liveid
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            &[
                &record.file_id,
                &record.object_id,
                &record.day_id,
                &format_date(&record.date_taken),
                &record.mtime,
                &record.is_video,
                &record.video_duration,
                &i64::from(record.width),
                &i64::from(record.height),
                &record.exif,
                &record.live_id,
            ],
        )?;
        Ok(())
    }

    fn update_record(&self, record: &TimelineRecord) -> Result<usize> {
        let mut client = self.pool.get()?;
        let affected = client.execute(
            r#"
            UPDATE timeline SET
                dayid = $1, datetaken = $2, mtime = $3, isvideo = $4, video_duration = $5,
                w = $6, h = $7, exif = $8, liveid = $9
            WHERE fileid = $10
            "#,
            &[
                &record.day_id,
                &format_date(&record.date_taken),
                &record.mtime,
                &record.is_video,
                &record.video_duration,
                &i64::from(record.width),
                &i64::from(record.height),
                &record.exif,
                &record.live_id,
                &record.file_id,
            ],
        )?;
        Ok(affected as usize)
    }

    fn delete_record(&self, file_id: i64) -> Result<usize> {
        let mut client = self.pool.get()?;
        let affected = client.execute("DELETE FROM timeline WHERE fileid = $1", &[&file_id])?;
        Ok(affected as usize)
    }

    fn day_summaries(&self) -> Result<Vec<DaySummary>> {
        let mut client = self.pool.get()?;
        let rows = client.query(
            "SELECT dayid, COUNT(*) FROM timeline WHERE orphan = FALSE GROUP BY dayid ORDER BY dayid DESC",
            &[],
        )?;
        Ok(rows
            .iter()
            .map(|row| DaySummary {
                day_id: row.get(0),
                count: row.get(1),
            })
            .collect())
    }

    fn day_records(&self, day_id: i64) -> Result<Vec<TimelineRecord>> {
        let mut client = self.pool.get()?;
        let rows = client.query(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM timeline \
                 WHERE dayid = $1 AND orphan = FALSE \
                 ORDER BY datetaken DESC, fileid DESC"
            ),
            &[&day_id],
        )?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    // ========================================================================
    // Live photo rows
    // ========================================================================

    fn livephoto_mtime(&self, file_id: i64) -> Result<Option<i64>> {
        let mut client = self.pool.get()?;
        let row = client.query_opt(
            "SELECT mtime FROM timeline_livephoto WHERE fileid = $1",
            &[&file_id],
        )?;
        Ok(row.map(|r| r.get(0)))
    }

    fn get_livephoto(&self, file_id: i64) -> Result<Option<LivePhotoPart>> {
        let mut client = self.pool.get()?;
        let row = client.query_opt(
            "SELECT fileid, liveid, mtime, orphan FROM timeline_livephoto WHERE fileid = $1",
            &[&file_id],
        )?;
        Ok(row.as_ref().map(row_to_livephoto))
    }

    fn livephoto_by_live_id(&self, live_id: &str) -> Result<Option<LivePhotoPart>> {
        let mut client = self.pool.get()?;
        let row = client.query_opt(
            "SELECT fileid, liveid, mtime, orphan FROM timeline_livephoto \
             WHERE liveid = $1 AND orphan = FALSE \
             ORDER BY fileid LIMIT 1",
            &[&live_id],
        )?;
        Ok(row.as_ref().map(row_to_livephoto))
    }

    fn insert_livephoto(&self, part: &LivePhotoPart) -> Result<()> {
        let mut client = self.pool.get()?;
        client.execute(
            "INSERT INTO timeline_livephoto (fileid, liveid, mtime) VALUES ($1, $2, $3)",
            &[&part.file_id, &part.live_id, &part.mtime],
        )?;
        Ok(())
    }

    fn update_livephoto(&self, part: &LivePhotoPart) -> Result<usize> {
        let mut client = self.pool.get()?;
        let affected = client.execute(
            "UPDATE timeline_livephoto SET liveid = $1, mtime = $2 WHERE fileid = $3",
            &[&part.live_id, &part.mtime, &part.file_id],
        )?;
        Ok(affected as usize)
    }

    fn delete_livephoto(&self, file_id: i64) -> Result<usize> {
        let mut client = self.pool.get()?;
        let affected =
            client.execute("DELETE FROM timeline_livephoto WHERE fileid = $1", &[&file_id])?;
        Ok(affected as usize)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    fn orphan_all(&self) -> Result<usize> {
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        let mut affected = tx.execute("UPDATE timeline SET orphan = TRUE", &[])?;
        affected += tx.execute("UPDATE timeline_livephoto SET orphan = TRUE", &[])?;
        tx.commit()?;
        Ok(affected as usize)
    }

    fn unorphan(&self, file_id: i64) -> Result<usize> {
        let mut client = self.pool.get()?;
        let mut affected = client.execute(
            "UPDATE timeline SET orphan = FALSE WHERE fileid = $1 AND orphan = TRUE",
            &[&file_id],
        )?;
        affected += client.execute(
            "UPDATE timeline_livephoto SET orphan = FALSE WHERE fileid = $1 AND orphan = TRUE",
            &[&file_id],
        )?;
        Ok(affected as usize)
    }

    fn remove_orphans(&self) -> Result<usize> {
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        let mut affected = tx.execute("DELETE FROM timeline WHERE orphan = TRUE", &[])?;
        affected += tx.execute("DELETE FROM timeline_livephoto WHERE orphan = TRUE", &[])?;
        tx.commit()?;
        Ok(affected as usize)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    fn truncate(&self) -> Result<()> {
        let mut client = self.pool.get()?;
        client.batch_execute("TRUNCATE TABLE timeline, timeline_livephoto")?;
        Ok(())
    }
}
