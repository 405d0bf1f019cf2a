//! Composite log sink: console plus a dated log file.
//!
//! [`build_dispatch`] returns a [`tracing::Dispatch`] rather than installing
//! a global subscriber, so it can be handed to
//! [`crate::process::PreviewProcessor::with_dispatch`] (or installed globally
//! by the binary). The file layer writes through a non-blocking appender;
//! keep the returned [`WorkerGuard`] alive until the run ends or the last
//! lines are lost.

use crate::error::PreviewError;
use std::path::{Path, PathBuf};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory for `preview.<date>.log` files.
    pub logs_dir: PathBuf,
    /// Console verbosity; `OFF` silences the console. `RUST_LOG` overrides it.
    pub console_level: LevelFilter,
    pub file_level: LevelFilter,
}

impl LogSettings {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            console_level: LevelFilter::INFO,
            file_level: LevelFilter::INFO,
        }
    }
}

/// Build the console + daily file subscriber.
pub fn build_dispatch(settings: &LogSettings) -> Result<(Dispatch, WorkerGuard), PreviewError> {
    let appender = daily_appender(&settings.logs_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.console_level.to_string()));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(settings.file_level),
        );

    Ok((Dispatch::new(subscriber), guard))
}

fn daily_appender(logs_dir: &Path) -> Result<RollingFileAppender, PreviewError> {
    std::fs::create_dir_all(logs_dir).map_err(|source| PreviewError::ConfigFile {
        path: logs_dir.to_path_buf(),
        source,
    })?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("preview")
        .filename_suffix("log")
        .build(logs_dir)
        .map_err(|e| PreviewError::InvalidConfig(format!("Cannot open log file: {e}")))
}
