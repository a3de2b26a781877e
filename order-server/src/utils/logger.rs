//! Logging setup
//!
//! Console output by default; with a log directory, a daily rolling file
//! named `order-server.<date>` instead.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with console output at `info`
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger from `LOG_LEVEL` (default `info`) and `LOG_DIR`
///
/// Runs before [`crate::Config::from_env`] so configuration warnings are
/// visible.
pub fn init_logger_from_env() {
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty());
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` overrides `log_level` when set. A missing log directory is
/// created; if that fails, logging falls back to the console.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if std::fs::create_dir_all(log_path).is_ok()
            && let Some(dir_str) = log_path.to_str()
        {
            let file_appender = tracing_appender::rolling::daily(dir_str, "order-server");
            subscriber.with_ansi(false).with_writer(file_appender).init();
            return;
        }
    }

    subscriber.init();
}
