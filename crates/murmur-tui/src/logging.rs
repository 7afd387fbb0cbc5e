use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use murmur_config::{expand_tilde, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the level filter. `RUST_LOG` wins over the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level {}: {}", level, e))
}

/// Resolve the configured log file, if any
pub fn log_file_path(config: &LoggingConfig) -> Option<PathBuf> {
    config
        .file
        .as_deref()
        .filter(|file| !file.trim().is_empty())
        .and_then(expand_tilde)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Log path has no file name: {:?}", path))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir.to_path_buf(), PathBuf::from(file_name)))
}

/// Install the global subscriber.
///
/// The terminal belongs to the chat view, so output only goes to the log
/// file. Without a file logging stays off. Keep the returned guard alive
/// until exit or buffered lines are lost.
pub fn init(config: &LoggingConfig, level: &str) -> Result<Option<WorkerGuard>> {
    let Some(path) = log_file_path(config) else {
        return Ok(None);
    };

    let (dir, file_name) = split_log_path(&path)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {:?}", dir))?;

    let appender = tracing_appender::rolling::never(&dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(build_filter(level)?)
        .with(layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::info!(target: "murmur", "Logging to {:?} at level {}", path, level);
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_expands_tilde() {
        let config = LoggingConfig::default();
        let path = log_file_path(&config).unwrap();
        assert!(path.ends_with("murmur.log"));
        assert!(!path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_blank_log_file_disables_logging() {
        let config = LoggingConfig {
            file: Some("  ".to_string()),
            ..LoggingConfig::default()
        };
        assert!(log_file_path(&config).is_none());

        let config = LoggingConfig {
            file: None,
            ..LoggingConfig::default()
        };
        assert!(log_file_path(&config).is_none());
    }

    #[test]
    fn test_split_log_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("logs").join("chat.log");
        let (dir, file) = split_log_path(&path).unwrap();
        assert_eq!(dir, temp.path().join("logs"));
        assert_eq!(file, PathBuf::from("chat.log"));

        let (dir, _) = split_log_path(Path::new("chat.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        if std::env::var("RUST_LOG").is_err() {
            assert!(build_filter("info").is_ok());
            assert!(build_filter("murmur=loudest").is_err());
        }
    }
}
