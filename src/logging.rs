//! Logging setup for the CLI.
//!
//! Two sinks are installed. Warnings and errors always go to stderr so a
//! user running `photoline index` sees failed files. Everything passing the
//! `PHOTOLINE_LOG` filter (or `[logging] level`) goes to a persistent sink:
//! the systemd journal on Linux when enabled and reachable, otherwise a
//! daily rolling file under the configured log directory.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// The file writer stops flushing once its guard drops.
static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Directory for rolling log files.
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
    config.directory.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photoline")
            .join("logs")
    })
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env("PHOTOLINE_LOG").unwrap_or_else(|_| EnvFilter::new(&config.level))
}

#[cfg(target_os = "linux")]
fn journald_layer(config: &LoggingConfig) -> Option<BoxedLayer> {
    if !config.journald {
        return None;
    }
    let layer = tracing_journald::layer().ok()?;
    Some(layer.with_filter(env_filter(config)).boxed())
}

#[cfg(not(target_os = "linux"))]
fn journald_layer(_config: &LoggingConfig) -> Option<BoxedLayer> {
    None
}

fn file_layer(config: &LoggingConfig) -> Result<BoxedLayer> {
    let dir = log_dir(config);
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::daily(&dir, "photoline.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    Ok(fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(env_filter(config))
        .boxed())
}

/// Install the global subscriber. Call once per process.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(LevelFilter::WARN)
        .boxed();

    let (persistent, backend) = match journald_layer(config) {
        Some(layer) => (layer, "journald"),
        None => (file_layer(config)?, "file"),
    };

    let layers: Vec<BoxedLayer> = vec![stderr, persistent];
    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(backend, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_prefers_configured_directory() {
        let config = LoggingConfig {
            directory: Some(PathBuf::from("/var/log/photoline")),
            ..LoggingConfig::default()
        };
        assert_eq!(log_dir(&config), PathBuf::from("/var/log/photoline"));

        let default_dir = log_dir(&LoggingConfig::default());
        assert!(default_dir.ends_with("photoline/logs"));
    }
}
