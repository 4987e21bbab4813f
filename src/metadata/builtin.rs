//! In-process metadata reader built on kamadak-exif and the image decoder.
//!
//! Covers still images well; containers it cannot parse (most video) yield
//! an error and the index falls back to file attributes.

use serde_json::Value;
use std::fs::File;
use std::io::BufReader;

use super::{ExtractError, Metadata, MetadataExtractor};
use crate::filestore::FileHandle;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinExtractor;

impl MetadataExtractor for BuiltinExtractor {
    fn extract(&self, file: &dyn FileHandle) -> Result<Metadata, ExtractError> {
        let path = file.path();
        let mut metadata = Metadata::new();

        let exif_error = {
            let mut bufreader = BufReader::new(File::open(path)?);
            match exif::Reader::new().read_from_container(&mut bufreader) {
                Ok(exif) => {
                    for field in exif.fields() {
                        if field.ifd_num != exif::In::PRIMARY {
                            continue;
                        }
                        if let Some(value) = field_to_value(&field.value) {
                            metadata.insert(field.tag.to_string(), value);
                        }
                    }
                    None
                }
                Err(e) => Some(e),
            }
        };

        // Decoder dimensions are authoritative when EXIF has none
        if let Ok(reader) = image::ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
            if let Ok((w, h)) = reader.into_dimensions() {
                metadata.entry("ImageWidth").or_insert(Value::from(w));
                metadata.entry("ImageHeight").or_insert(Value::from(h));
            }
        }

        match exif_error {
            Some(e) if metadata.is_empty() => Err(e.into()),
            _ => Ok(metadata),
        }
    }
}

/// Flatten an EXIF value. Single numbers become JSON numbers, ASCII becomes a
/// string, everything else its display form. Opaque blobs are skipped.
fn field_to_value(value: &exif::Value) -> Option<Value> {
    match value {
        exif::Value::Ascii(parts) => {
            let text = parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" ");
            Some(Value::String(text))
        }
        exif::Value::Short(v) if v.len() == 1 => Some(Value::from(v[0])),
        exif::Value::Long(v) if v.len() == 1 => Some(Value::from(v[0])),
        exif::Value::Byte(v) if v.len() == 1 => Some(Value::from(v[0])),
        exif::Value::SShort(v) if v.len() == 1 => Some(Value::from(v[0])),
        exif::Value::SLong(v) if v.len() == 1 => Some(Value::from(v[0])),
        exif::Value::Rational(v) if v.len() == 1 => {
            serde_json::Number::from_f64(v[0].to_f64()).map(Value::Number)
        }
        exif::Value::SRational(v) if v.len() == 1 => {
            serde_json::Number::from_f64(v[0].to_f64()).map(Value::Number)
        }
        exif::Value::Undefined(..) | exif::Value::Unknown(..) => None,
        other => Some(Value::String(format!("{}", other.display_as(exif::Tag::ImageDescription)))),
    }
}
