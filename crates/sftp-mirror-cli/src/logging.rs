use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_FILE: &str = "./logs/sftp-mirror.log";

/// `TRACING_LEVEL` sets the filter. `LOG_FILE_PATH` names the log file; set
/// it empty to log to stdout only. Keep the returned guard alive until exit.
pub fn init_logger() -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let filter_layer =
        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match log_file_path() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .unwrap_or_else(|| OsStr::new("sftp-mirror.log"));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .compact()
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter_layer)
        .init();

    match log_file_path() {
        Some(path) => info!("Logging to stdout and {}", path.display()),
        None => info!("Logging to stdout only"),
    }

    guard
}

fn log_file_path() -> Option<PathBuf> {
    match env::var("LOG_FILE_PATH") {
        Ok(path) if path.trim().is_empty() => None,
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => Some(PathBuf::from(DEFAULT_LOG_FILE)),
    }
}
