//! PostgreSQL schema, kept column-for-column in step with the SQLite one.

pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS timeline (
    fileid BIGINT PRIMARY KEY,
    objectid TEXT NOT NULL,
    dayid BIGINT NOT NULL,
    datetaken TEXT NOT NULL,
    mtime BIGINT NOT NULL,
    isvideo BOOLEAN NOT NULL DEFAULT FALSE,
    video_duration BIGINT NOT NULL DEFAULT 0,
    w BIGINT NOT NULL DEFAULT 0,
    h BIGINT NOT NULL DEFAULT 0,
    exif TEXT,
    liveid TEXT NOT NULL DEFAULT '',
    orphan BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS idx_timeline_day ON timeline(dayid, orphan);
CREATE INDEX IF NOT EXISTS idx_timeline_liveid ON timeline(liveid);
CREATE INDEX IF NOT EXISTS idx_timeline_orphan ON timeline(orphan);

CREATE TABLE IF NOT EXISTS timeline_livephoto (
    fileid BIGINT PRIMARY KEY,
    liveid TEXT NOT NULL,
    mtime BIGINT NOT NULL,
    orphan BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS idx_timeline_livephoto_liveid ON timeline_livephoto(liveid);
"#;
