pub const SCHEMA: &str = r#"
-- One row per indexed photo or video
CREATE TABLE IF NOT EXISTS timeline (
    fileid INTEGER PRIMARY KEY,
    objectid TEXT NOT NULL,
    dayid INTEGER NOT NULL,
    datetaken TEXT NOT NULL,       -- UTC, 'YYYY-MM-DD HH:MM:SS'
    mtime INTEGER NOT NULL,
    isvideo INTEGER NOT NULL DEFAULT 0,
    video_duration INTEGER NOT NULL DEFAULT 0,
    w INTEGER NOT NULL DEFAULT 0,
    h INTEGER NOT NULL DEFAULT 0,
    exif TEXT,                     -- sanitized JSON, at most 65535 bytes
    liveid TEXT NOT NULL DEFAULT '',
    orphan INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_timeline_day ON timeline(dayid, orphan);
CREATE INDEX IF NOT EXISTS idx_timeline_liveid ON timeline(liveid);
CREATE INDEX IF NOT EXISTS idx_timeline_orphan ON timeline(orphan);

-- Motion clips of live photos; the still lives in timeline with the same liveid.
-- Copies of a clip share a liveid, so it is not unique.
CREATE TABLE IF NOT EXISTS timeline_livephoto (
    fileid INTEGER PRIMARY KEY,
    liveid TEXT NOT NULL,
    mtime INTEGER NOT NULL,
    orphan INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_timeline_livephoto_liveid ON timeline_livephoto(liveid);
"#;
