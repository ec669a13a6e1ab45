//! Logging infrastructure for prepline
//!
//! Logs go to the console and, unless disabled, to two daily-rotated files:
//!
//! - `prepline.<date>.log`: all levels
//! - `error.<date>.log`: warnings and errors only
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! the binary's job.
//!
//! ```no_run
//! prepline::logging::init(None, true).expect("Failed to initialize logging");
//! tracing::info!("Ready");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Default log directory
///
/// - Windows: `%APPDATA%/prepline/logs`
/// - macOS: `~/Library/Application Support/prepline/logs`
/// - Linux: `~/.local/share/prepline/logs`
pub fn default_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("prepline").join("logs"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(())
}

fn env_filter(default: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .context("Failed to create env filter")
}

/// Install the global subscriber.
///
/// `log_dir` of `None` resolves to [`default_log_dir`]. With `to_files` false
/// only the console layer is installed.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or a file appender
/// fails to build.
pub fn init(log_dir: Option<&Path>, to_files: bool) -> Result<()> {
    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .pretty();

    if !to_files {
        tracing_subscriber::registry()
            .with(env_filter("info")?)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(());
    }

    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("prepline")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter("info")?)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        log_file = %current_log_path(&log_dir).display(),
        "Logging initialized"
    );

    Ok(())
}

/// Path of today's main log file inside `log_dir`.
pub fn current_log_path(log_dir: &Path) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    log_dir.join(format!("prepline.{today}.log"))
}
