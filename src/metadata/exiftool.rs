// ExifTool wrapper for photo and video metadata extraction

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ExtractError, Metadata, MetadataExtractor};
use crate::filestore::FileHandle;

#[derive(Debug, Clone)]
pub struct ExiftoolExtractor {
    binary: PathBuf,
}

impl ExiftoolExtractor {
    pub fn new(binary: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
        }
    }

    /// Installed exiftool version, or None if it cannot be run.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary).arg("-ver").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }
}

impl MetadataExtractor for ExiftoolExtractor {
    /// Run exiftool in JSON mode with raw numeric values (-n).
    fn extract(&self, file: &dyn FileHandle) -> Result<Metadata, ExtractError> {
        let output = Command::new(&self.binary)
            .args(["-api", "largefilesupport=1", "-json", "-n"])
            .arg(file.path())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExtractError::Tool(if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            }));
        }

        parse_output(&output.stdout)
    }
}

/// exiftool prints an array with one object per input file; take the first.
fn parse_output(stdout: &[u8]) -> Result<Metadata, ExtractError> {
    let raw: Value = serde_json::from_slice(stdout)?;
    match raw {
        Value::Array(mut items) if !items.is_empty() => match items.swap_remove(0) {
            Value::Object(mut map) => {
                map.remove("SourceFile");
                Ok(map)
            }
            _ => Err(ExtractError::Tool("unexpected exiftool output shape".to_string())),
        },
        _ => Err(ExtractError::Tool("exiftool returned no records".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_takes_first_record() {
        let stdout = br#"[{"SourceFile":"/p/IMG_1.MOV","MIMEType":"video/quicktime","Duration":2.95,"ContentIdentifier":"LP123"}]"#;
        let metadata = parse_output(stdout).unwrap();

        assert!(!metadata.contains_key("SourceFile"));
        assert_eq!(metadata.get("ContentIdentifier"), Some(&Value::from("LP123")));
        assert_eq!(metadata.get("Duration"), Some(&Value::from(2.95)));
    }

    #[test]
    fn test_parse_output_rejects_garbage() {
        assert!(matches!(parse_output(b"[]"), Err(ExtractError::Tool(_))));
        assert!(matches!(parse_output(b"not json"), Err(ExtractError::Output(_))));
        assert!(matches!(parse_output(b"[42]"), Err(ExtractError::Tool(_))));
    }

    #[test]
    fn test_missing_binary() {
        let tool = ExiftoolExtractor::new(Path::new("/nonexistent/exiftool"));
        assert!(tool.version().is_none());
    }
}
