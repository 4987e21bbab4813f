//! Embedded metadata extraction.
//!
//! Extractors turn a file into a flat key/value map keyed by exiftool-style
//! tag names (`DateTimeOriginal`, `ImageWidth`, `ContentIdentifier`, ...).
//! The index treats any [`ExtractError`] as "no metadata" and keeps going.

pub mod builtin;
pub mod exiftool;

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{MetadataBackend, MetadataConfig};
use crate::filestore::FileHandle;

pub use builtin::BuiltinExtractor;
pub use exiftool::ExiftoolExtractor;

/// Flat tag name -> value map. Keys are kept sorted so serialization is stable.
pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EXIF decode error: {0}")]
    Exif(#[from] exif::Error),

    #[error("exiftool failed: {0}")]
    Tool(String),

    #[error("unreadable exiftool output: {0}")]
    Output(#[from] serde_json::Error),
}

pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, file: &dyn FileHandle) -> Result<Metadata, ExtractError>;
}

/// Pick an extractor according to config. `Auto` probes for exiftool once.
pub fn build_extractor(config: &MetadataConfig) -> Arc<dyn MetadataExtractor> {
    match config.backend {
        MetadataBackend::Exiftool => Arc::new(ExiftoolExtractor::new(&config.exiftool_path)),
        MetadataBackend::Builtin => Arc::new(BuiltinExtractor),
        MetadataBackend::Auto => {
            let tool = ExiftoolExtractor::new(&config.exiftool_path);
            match tool.version() {
                Some(version) => {
                    tracing::info!(version = %version, "Using exiftool for metadata");
                    Arc::new(tool)
                }
                None => {
                    tracing::info!("exiftool not available, using builtin EXIF reader");
                    Arc::new(BuiltinExtractor)
                }
            }
        }
    }
}

/// String value of a tag, ignoring empty strings.
pub fn get_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    match metadata.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
        _ => None,
    }
}

/// Numeric value of a tag, accepting numbers and numeric strings.
pub fn get_f64(metadata: &Metadata, key: &str) -> Option<f64> {
    match metadata.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filestore::MediaFile;
    use image::{ImageBuffer, Rgb};
    use serde_json::json;
    use tempfile::tempdir;

    fn meta(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_str_skips_blank_and_non_strings() {
        let m = meta(json!({ "Make": "Apple", "Blank": "  ", "Iso": 100 }));
        assert_eq!(get_str(&m, "Make"), Some("Apple"));
        assert_eq!(get_str(&m, "Blank"), None);
        assert_eq!(get_str(&m, "Iso"), None);
        assert_eq!(get_str(&m, "Missing"), None);
    }

    #[test]
    fn test_get_f64_accepts_numeric_strings() {
        let m = meta(json!({ "Duration": "12.6", "TrackDuration": 3.2, "Bad": "n/a" }));
        assert_eq!(get_f64(&m, "Duration"), Some(12.6));
        assert_eq!(get_f64(&m, "TrackDuration"), Some(3.2));
        assert_eq!(get_f64(&m, "Bad"), None);
    }

    #[test]
    fn test_backend_selection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        ImageBuffer::from_pixel(2, 5, Rgb([0u8, 0, 0])).save(&path).unwrap();
        let file = MediaFile::from_path(&path).unwrap();

        let missing_tool = MetadataConfig {
            backend: MetadataBackend::Exiftool,
            exiftool_path: dir.path().join("no-such-exiftool"),
        };
        let err = build_extractor(&missing_tool).extract(&file).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));

        // Auto falls back to the builtin reader when the tool cannot run
        let auto = MetadataConfig {
            backend: MetadataBackend::Auto,
            ..missing_tool
        };
        let metadata = build_extractor(&auto).extract(&file).unwrap();
        assert_eq!(get_f64(&metadata, "ImageWidth"), Some(2.0));
        assert_eq!(get_f64(&metadata, "ImageHeight"), Some(5.0));

        let builtin = MetadataConfig {
            backend: MetadataBackend::Builtin,
            ..MetadataConfig::default()
        };
        assert!(build_extractor(&builtin).extract(&file).is_ok());
    }
}
