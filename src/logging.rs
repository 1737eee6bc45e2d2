use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "gamefilm.log";

/// Default log location: the platform data dir, or the working directory when
/// no home directory can be determined.
pub fn default_log_path() -> PathBuf {
  ProjectDirs::from("", "", "gamefilm")
    .map(|dirs| dirs.data_dir().join(LOG_FILE_NAME))
    .unwrap_or_else(|| PathBuf::from(LOG_FILE_NAME))
}

/// Route `tracing` output to a file; the terminal belongs to the UI.
///
/// Level defaults to `info` and can be overridden with `RUST_LOG`. The
/// returned guard flushes the non-blocking writer on drop and must be held
/// for the lifetime of the program.
pub fn init_logging(path: &Path) -> Result<WorkerGuard> {
  let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let file_name = path.file_name().context("Log path has no file name")?;
  std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

  let appender = tracing_appender::rolling::never(dir, file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .with_target(false)
    .try_init()
    .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
