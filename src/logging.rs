use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub const LOG_ENV: &str = "CUTOVER_LOG";
pub const DEFAULT_FILTER: &str = "cutover=info,sqlx=warn";
const LOG_FILE_PREFIX: &str = "cutover.log";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub json: bool,
    /// Daily-rolling JSON log files are written here when set.
    pub log_dir: Option<PathBuf>,
    /// Overrides `CUTOVER_LOG`.
    pub filter: Option<String>,
}

impl LoggingConfig {
    fn directives(&self) -> String {
        self.filter
            .clone()
            .or_else(|| std::env::var(LOG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string())
    }
}

/// Installs the global subscriber. Console output goes to stderr so stdout
/// stays free for reports. Keep the returned guard alive until exit or
/// buffered file records are lost.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(config.directives()).context("parse log filter")?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if config.json {
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stderr)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stderr)
                .boxed(),
        );
    }

    let mut guard = None;
    if let Some(dir) = &config.log_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(worker);
    }

    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            filter: Some("cutover=debug".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(config.directives(), "cutover=debug");
    }

    #[test]
    fn bad_filter_is_rejected() {
        let config = LoggingConfig {
            filter: Some("cutover=notalevel".into()),
            ..LoggingConfig::default()
        };
        assert!(init(&config).is_err());
    }

    #[test]
    fn file_sink_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let config = LoggingConfig {
            json: true,
            log_dir: Some(logs.clone()),
            filter: Some(DEFAULT_FILTER.into()),
        };
        let guard = init(&config).unwrap();
        assert!(guard.is_some());
        assert!(logs.is_dir());
    }
}
