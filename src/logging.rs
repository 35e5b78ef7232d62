use crate::app_dirs::AppDirs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "typeforge.log";
const DEFAULT_FILTER: &str = "typeforge=info";

/// Install a file-backed subscriber. The terminal belongs to the UI, so
/// nothing is written to stdout or stderr.
///
/// The returned guard flushes the writer on drop and must live as long as
/// the program. `None` means a subscriber was already installed.
pub fn init() -> Option<WorkerGuard> {
    let dir = AppDirs::log_dir().unwrap_or_else(|| PathBuf::from("."));
    init_in(&dir)
}

pub fn init_in(dir: &Path) -> Option<WorkerGuard> {
    if std::fs::create_dir_all(dir).is_err() {
        return None;
    }

    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}
