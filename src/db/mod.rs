mod backend;
mod schema;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod postgres_schema;

use anyhow::Result;
use chrono::NaiveDateTime;
use std::path::Path;

pub use backend::IndexStore;

use crate::config::{DatabaseConfig, DatabaseType};

/// Storage format of `datetaken`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical timeline row for one photo or video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRecord {
    pub file_id: i64,
    /// Defaults to the file id as a string; kept as-is on update.
    pub object_id: String,
    pub day_id: i64,
    /// Capture time in UTC.
    pub date_taken: NaiveDateTime,
    pub mtime: i64,
    pub is_video: bool,
    /// Whole seconds, 0 for images or unknown
    pub video_duration: i64,
    pub width: u32,
    pub height: u32,
    pub exif: String,
    /// Shared live-photo identifier, empty if none
    pub live_id: String,
    pub orphan: bool,
}

/// Motion component of a live photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivePhotoPart {
    pub file_id: i64,
    pub live_id: String,
    pub mtime: i64,
    pub orphan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySummary {
    pub day_id: i64,
    pub count: i64,
}

pub(crate) fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT).unwrap_or_default()
}

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    ($self:expr, $method:ident($($arg:expr),* $(,)?)) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method($($arg),*),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method($($arg),*),
        }
    };
}

enum DatabaseInner {
    Sqlite(sqlite::SqliteDb),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PgDb),
}

pub struct Database {
    inner: DatabaseInner,
}

impl Database {
    /// Open a database connection based on the provided configuration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        #[cfg(feature = "postgres")]
        {
            if config.backend == DatabaseType::Postgresql {
                let url = config
                    .postgresql_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("PostgreSQL URL not configured"))?;
                let pool_size = config.pool_size.unwrap_or(10);
                let pg = postgres::PgDb::open(url, pool_size)?;
                return Ok(Self { inner: DatabaseInner::Postgres(pg) });
            }
        }

        #[cfg(not(feature = "postgres"))]
        {
            if config.backend == DatabaseType::Postgresql {
                anyhow::bail!("PostgreSQL support not compiled in, rebuild with --features postgres");
            }
        }

        Self::open_sqlite(&config.sqlite_path)
    }

    pub fn open_sqlite(path: &Path) -> Result<Self> {
        let db = sqlite::SqliteDb::open(path)?;
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.inner {
            DatabaseInner::Sqlite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(_) => "postgresql",
        }
    }
}

impl IndexStore for Database {
    fn initialize(&self) -> Result<()> {
        dispatch!(self, initialize())
    }

    fn timeline_mtime(&self, file_id: i64) -> Result<Option<i64>> {
        dispatch!(self, timeline_mtime(file_id))
    }

    fn get_record(&self, file_id: i64) -> Result<Option<TimelineRecord>> {
        dispatch!(self, get_record(file_id))
    }

    fn insert_record(&self, record: &TimelineRecord) -> Result<()> {
        dispatch!(self, insert_record(record))
    }

    fn update_record(&self, record: &TimelineRecord) -> Result<usize> {
        dispatch!(self, update_record(record))
    }

    fn delete_record(&self, file_id: i64) -> Result<usize> {
        dispatch!(self, delete_record(file_id))
    }

    fn day_summaries(&self) -> Result<Vec<DaySummary>> {
        dispatch!(self, day_summaries())
    }

    fn day_records(&self, day_id: i64) -> Result<Vec<TimelineRecord>> {
        dispatch!(self, day_records(day_id))
    }

    fn livephoto_mtime(&self, file_id: i64) -> Result<Option<i64>> {
        dispatch!(self, livephoto_mtime(file_id))
    }

    fn get_livephoto(&self, file_id: i64) -> Result<Option<LivePhotoPart>> {
        dispatch!(self, get_livephoto(file_id))
    }

    fn livephoto_by_live_id(&self, live_id: &str) -> Result<Option<LivePhotoPart>> {
        dispatch!(self, livephoto_by_live_id(live_id))
    }

    fn insert_livephoto(&self, part: &LivePhotoPart) -> Result<()> {
        dispatch!(self, insert_livephoto(part))
    }

    fn update_livephoto(&self, part: &LivePhotoPart) -> Result<usize> {
        dispatch!(self, update_livephoto(part))
    }

    fn delete_livephoto(&self, file_id: i64) -> Result<usize> {
        dispatch!(self, delete_livephoto(file_id))
    }

    fn orphan_all(&self) -> Result<usize> {
        dispatch!(self, orphan_all())
    }

    fn unorphan(&self, file_id: i64) -> Result<usize> {
        dispatch!(self, unorphan(file_id))
    }

    fn remove_orphans(&self) -> Result<usize> {
        dispatch!(self, remove_orphans())
    }

    fn truncate(&self) -> Result<()> {
        dispatch!(self, truncate())
    }
}
