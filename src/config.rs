use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Sqlite,
    Postgresql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseType,

    #[serde(default = "default_db_path")]
    pub sqlite_path: PathBuf,

    /// Connection string, e.g. "host=localhost user=photoline dbname=photoline"
    #[serde(default)]
    pub postgresql_url: Option<String>,

    #[serde(default)]
    pub pool_size: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseType::default(),
            sqlite_path: default_db_path(),
            postgresql_url: None,
            pool_size: None,
        }
    }
}

/// Which media gets indexed and how its metadata is trimmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_image_mimes")]
    pub image_mimes: Vec<String>,

    #[serde(default = "default_video_mimes")]
    pub video_mimes: Vec<String>,

    /// Metadata keys starting with any of these are dropped before storage.
    #[serde(default = "default_noisy_prefixes")]
    pub noisy_prefixes: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            image_mimes: default_image_mimes(),
            video_mimes: default_video_mimes(),
            noisy_prefixes: default_noisy_prefixes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    /// Use exiftool when it can be run, otherwise the builtin reader.
    #[default]
    Auto,
    Exiftool,
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub backend: MetadataBackend,

    #[serde(default = "default_exiftool_path")]
    pub exiftool_path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            exiftool_path: default_exiftool_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreviewConfig {
    /// Image mimes that have a preview provider even though the image
    /// decoder cannot read them (e.g. "image/heic" with an external converter).
    #[serde(default)]
    pub extra_mimes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Library roots walked by `photoline index`.
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    #[serde(default)]
    pub follow_links: bool,

    /// Worker threads for a scan; rayon picks a default when unset.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            follow_links: false,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter for the persistent sink when `PHOTOLINE_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Send logs to the systemd journal when it is reachable (Linux only).
    #[serde(default = "default_true")]
    pub journald: bool,

    /// Rolling log file directory; defaults under the local data dir.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            journald: true,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoline")
        .join("photoline.db")
}

fn default_exiftool_path() -> PathBuf {
    PathBuf::from("exiftool")
}

fn default_roots() -> Vec<PathBuf> {
    dirs::picture_dir().into_iter().collect()
}

fn default_image_mimes() -> Vec<String> {
    [
        "image/png",
        "image/jpeg",
        "image/heic",
        "image/tiff",
        "image/webp",
        "image/gif",
        "image/bmp",
        "image/x-dcraw",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_video_mimes() -> Vec<String> {
    [
        "video/mpeg",
        "video/webm",
        "video/mp4",
        "video/quicktime",
        "video/x-matroska",
        "video/MP2T",
        "video/x-msvideo",
        "video/3gpp",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_noisy_prefixes() -> Vec<String> {
    // Maker notes and container atoms, huge and never shown
    vec!["Nikon".to_string(), "QuickTime".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            index: IndexConfig::default(),
            metadata: MetadataConfig::default(),
            preview: PreviewConfig::default(),
            scanner: ScannerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path, writing defaults there if it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photoline")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PHOTOLINE_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            sqlite_path = "/tmp/index.db"

            [index]
            noisy_prefixes = ["Canon"]
            "#,
        )
        .unwrap();

        assert_eq!(config.database.backend, DatabaseType::Sqlite);
        assert_eq!(config.database.sqlite_path, PathBuf::from("/tmp/index.db"));
        assert_eq!(config.index.noisy_prefixes, vec!["Canon".to_string()]);
        assert!(config.index.image_mimes.contains(&"image/jpeg".to_string()));
        assert!(config.index.video_mimes.contains(&"video/quicktime".to_string()));
        assert_eq!(config.metadata.backend, MetadataBackend::Auto);
    }

    #[test]
    fn test_logging_section() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            journald = false
            directory = "/srv/photoline/logs"
            "#,
        )
        .unwrap();

        assert!(!config.logging.journald);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.directory, Some(PathBuf::from("/srv/photoline/logs")));

        let defaults: Config = toml::from_str("").unwrap();
        assert!(defaults.logging.journald);
        assert!(defaults.logging.directory.is_none());
    }

    #[test]
    fn test_load_from_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.index.noisy_prefixes, default_noisy_prefixes());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.index.video_mimes, config.index.video_mimes);
    }
}
