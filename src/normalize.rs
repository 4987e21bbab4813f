//! Turns raw metadata and file attributes into a [`TimelineRecord`].
//!
//! Everything here is a pure function of its inputs so repeated scans of the
//! same file produce byte-identical rows.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::config::IndexConfig;
use crate::db::TimelineRecord;
use crate::filestore::FileHandle;
use crate::metadata::{get_f64, get_str, Metadata};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Longest string value kept in the stored metadata, in characters.
pub const MAX_FIELD_CHARS: usize = 2048;

/// Ceiling on the serialized metadata blob, in bytes.
pub const MAX_EXIF_BYTES: usize = 65_535;

const DATE_KEYS: [&str; 3] = ["DateTimeOriginal", "CreateDate", "ModifyDate"];

const DATE_FORMATS: [&str; 3] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const DIMENSION_KEYS: [(&str, &str); 3] = [
    ("ImageWidth", "ImageHeight"),
    ("ExifImageWidth", "ExifImageHeight"),
    ("PixelXDimension", "PixelYDimension"),
];

/// Day bucket of a capture time: whole days since the epoch, rounding down.
pub fn day_id(epoch_secs: i64) -> i64 {
    epoch_secs.div_euclid(SECONDS_PER_DAY)
}

/// Capture time in epoch seconds.
///
/// Embedded dates are wall-clock times without a reliable zone; they are
/// read as UTC so the day bucket matches the local calendar day of the shot.
/// Falls back to the file mtime when no usable date is present.
pub fn capture_epoch(metadata: &Metadata, mtime: i64) -> i64 {
    DATE_KEYS
        .iter()
        .filter_map(|key| get_str(metadata, key))
        .filter_map(parse_exif_date)
        .map(|date| date.and_utc().timestamp())
        .find(|epoch| *epoch > 0)
        .unwrap_or(mtime)
}

/// Parse "YYYY:MM:DD HH:MM:SS" and ISO-ish variants, ignoring any
/// sub-second or zone suffix.
fn parse_exif_date(value: &str) -> Option<NaiveDateTime> {
    let head = value.trim().get(..19)?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(head, format).ok())
}

/// Display dimensions, swapped for orientations that rotate by 90 degrees.
pub fn dimensions(metadata: &Metadata) -> (u32, u32) {
    let (w, h) = DIMENSION_KEYS
        .iter()
        .find_map(|(wk, hk)| {
            let w = positive_u32(metadata, wk)?;
            let h = positive_u32(metadata, hk)?;
            Some((w, h))
        })
        .unwrap_or((0, 0));

    let orientation = get_f64(metadata, "Orientation").unwrap_or(1.0) as i64;
    if (5..=8).contains(&orientation) {
        (h, w)
    } else {
        (w, h)
    }
}

fn positive_u32(metadata: &Metadata, key: &str) -> Option<u32> {
    let v = get_f64(metadata, key)?;
    (v >= 1.0 && v <= u32::MAX as f64).then(|| v as u32)
}

/// Video length in whole seconds, 0 when unknown.
pub fn video_duration(metadata: &Metadata) -> i64 {
    get_f64(metadata, "Duration")
        .or_else(|| get_f64(metadata, "TrackDuration"))
        .map(|d| d.round().max(0.0) as i64)
        .unwrap_or(0)
}

fn error_payload(reason: &str) -> String {
    serde_json::json!({ "error": reason }).to_string()
}

pub struct RecordNormalizer {
    noisy_prefixes: Vec<String>,
}

impl RecordNormalizer {
    pub fn new(noisy_prefixes: Vec<String>) -> Self {
        Self { noisy_prefixes }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.noisy_prefixes.clone())
    }

    /// Drop vendor keys and cap long strings.
    pub fn sanitize(&self, metadata: Metadata) -> Metadata {
        metadata
            .into_iter()
            .filter(|(key, _)| !self.noisy_prefixes.iter().any(|p| key.starts_with(p.as_str())))
            .map(|(key, value)| match value {
                Value::String(s) if s.chars().count() > MAX_FIELD_CHARS => {
                    (key, Value::String(s.chars().take(MAX_FIELD_CHARS).collect()))
                }
                other => (key, other),
            })
            .collect()
    }

    /// Serialize sanitized metadata, or an `{"error": ...}` payload when it
    /// cannot be encoded or would exceed [`MAX_EXIF_BYTES`].
    pub fn serialize(&self, metadata: &Metadata) -> String {
        match serde_json::to_string(metadata) {
            Ok(json) if json.len() > MAX_EXIF_BYTES => error_payload("Exif data too large"),
            Ok(json) => json,
            Err(_) => error_payload("Exif data encoding error"),
        }
    }

    /// Build the canonical row. `object_id` defaults to the file id; the
    /// update path never writes it back.
    pub fn build(
        &self,
        file: &dyn FileHandle,
        is_video: bool,
        metadata: Metadata,
        live_id: String,
    ) -> TimelineRecord {
        let epoch = capture_epoch(&metadata, file.mtime());
        let date_taken = DateTime::from_timestamp(epoch, 0)
            .unwrap_or_default()
            .naive_utc();
        let (width, height) = dimensions(&metadata);
        let video_duration = if is_video { video_duration(&metadata) } else { 0 };
        let exif = self.serialize(&self.sanitize(metadata));

        TimelineRecord {
            file_id: file.id(),
            object_id: file.id().to_string(),
            day_id: day_id(date_taken.and_utc().timestamp()),
            date_taken,
            mtime: file.mtime(),
            is_video,
            video_duration,
            width,
            height,
            exif,
            live_id,
            orphan: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filestore::MediaFile;
    use serde_json::json;
    use std::path::PathBuf;

    fn meta(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn file(mtime: i64) -> MediaFile {
        MediaFile {
            id: 42,
            mtime,
            mime: "image/jpeg".to_string(),
            path: PathBuf::from("/photos/IMG_0042.JPG"),
        }
    }

    fn normalizer() -> RecordNormalizer {
        RecordNormalizer::new(vec!["Nikon".to_string(), "QuickTime".to_string()])
    }

    #[test]
    fn test_day_id() {
        assert_eq!(day_id(1_700_000_000), 19675);
        assert_eq!(day_id(0), 0);
        assert_eq!(day_id(86_399), 0);
        assert_eq!(day_id(86_400), 1);
        assert_eq!(day_id(-1), -1);
    }

    #[test]
    fn test_capture_epoch_prefers_original() {
        let m = meta(json!({
            "DateTimeOriginal": "2023:11:14 22:13:20",
            "CreateDate": "2020:01:01 00:00:00",
        }));
        assert_eq!(capture_epoch(&m, 5), 1_700_000_000);
    }

    #[test]
    fn test_capture_epoch_variants_and_fallback() {
        let m = meta(json!({ "CreateDate": "2023-11-14T22:13:20.123+02:00" }));
        assert_eq!(capture_epoch(&m, 5), 1_700_000_000);

        let m = meta(json!({ "DateTimeOriginal": "0000:00:00 00:00:00" }));
        assert_eq!(capture_epoch(&m, 1234), 1234);

        let m = meta(json!({ "DateTimeOriginal": "1969:12:31 23:59:59" }));
        assert_eq!(capture_epoch(&m, 1234), 1234);

        assert_eq!(capture_epoch(&Metadata::new(), 99), 99);
    }

    #[test]
    fn test_dimensions() {
        let m = meta(json!({ "ImageWidth": 4032, "ImageHeight": 3024 }));
        assert_eq!(dimensions(&m), (4032, 3024));

        let m = meta(json!({ "ImageWidth": 4032, "ImageHeight": 3024, "Orientation": 6 }));
        assert_eq!(dimensions(&m), (3024, 4032));

        let m = meta(json!({ "PixelXDimension": 800, "PixelYDimension": "600" }));
        assert_eq!(dimensions(&m), (800, 600));

        let m = meta(json!({ "ImageWidth": 4032 }));
        assert_eq!(dimensions(&m), (0, 0));
    }

    #[test]
    fn test_video_duration() {
        assert_eq!(video_duration(&meta(json!({ "Duration": 2.5 }))), 3);
        assert_eq!(video_duration(&meta(json!({ "TrackDuration": "12.4" }))), 12);
        assert_eq!(video_duration(&meta(json!({ "Duration": -4 }))), 0);
        assert_eq!(video_duration(&Metadata::new()), 0);
    }

    #[test]
    fn test_sanitize_strips_vendor_keys_and_truncates() {
        let long = "x".repeat(MAX_FIELD_CHARS + 10);
        let m = meta(json!({
            "NikonMakerNote": "short",
            "QuickTimeAtom": 1,
            "Make": "Apple",
            "UserComment": long,
        }));

        let clean = normalizer().sanitize(m);
        assert!(!clean.contains_key("NikonMakerNote"));
        assert!(!clean.contains_key("QuickTimeAtom"));
        assert_eq!(clean.get("Make"), Some(&Value::from("Apple")));
        assert_eq!(
            clean.get("UserComment").and_then(|v| v.as_str()).map(|s| s.chars().count()),
            Some(MAX_FIELD_CHARS)
        );
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_FIELD_CHARS + 1);
        let clean = normalizer().sanitize(meta(json!({ "Title": long })));
        let title = clean.get("Title").and_then(|v| v.as_str()).unwrap();
        assert_eq!(title.chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_serialize_size_ceiling() {
        // Many fields under the per-field cap that add up past the blob ceiling
        let mut m = Metadata::new();
        for i in 0..40 {
            m.insert(format!("Field{i:02}"), Value::String("y".repeat(MAX_FIELD_CHARS)));
        }

        let n = normalizer();
        let json = n.serialize(&n.sanitize(m));
        assert_eq!(json, r#"{"error":"Exif data too large"}"#);
    }

    #[test]
    fn test_serialize_is_stable() {
        let n = normalizer();
        let a = n.serialize(&meta(json!({ "b": 1, "a": "x" })));
        let b = n.serialize(&meta(json!({ "a": "x", "b": 1 })));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":"x","b":1}"#);
    }

    #[test]
    fn test_build_record() {
        let m = meta(json!({
            "DateTimeOriginal": "2023:11:14 22:13:20",
            "ImageWidth": 4032,
            "ImageHeight": 3024,
            "Duration": 9.0,
            "NikonFoo": "bar",
        }));

        let record = normalizer().build(&file(1), false, m, "LP123".to_string());
        assert_eq!(record.file_id, 42);
        assert_eq!(record.object_id, "42");
        assert_eq!(record.day_id, 19675);
        assert_eq!(record.date_taken.to_string(), "2023-11-14 22:13:20");
        assert_eq!(record.mtime, 1);
        assert_eq!(record.video_duration, 0);
        assert_eq!((record.width, record.height), (4032, 3024));
        assert!(!record.exif.contains("NikonFoo"));
        assert_eq!(record.live_id, "LP123");
        assert!(!record.orphan);
    }

    #[test]
    fn test_build_without_metadata_uses_mtime() {
        let record = normalizer().build(&file(1_700_000_000), true, Metadata::new(), String::new());
        assert_eq!(record.day_id, 19675);
        assert_eq!(record.video_duration, 0);
        assert_eq!((record.width, record.height), (0, 0));
        assert_eq!(record.exif, "{}");
    }
}
