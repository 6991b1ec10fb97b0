use crate::constants::{DEFAULT_LOG_DIR, DEFAULT_LOG_FILTER, ENV_LOG_DIR, LOG_FILE_PREFIX};
use crate::error::{Result, ScraperError};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Flushes the JSON log file when dropped. Hold it for the life of `main`.
#[must_use]
pub struct LogGuard {
    _worker: WorkerGuard,
    pub dir: PathBuf,
}

/// Console output plus a daily-rotated JSON file under `LOG_DIR` (default
/// `logs/`). `RUST_LOG` overrides the default `ig_scraper=info` filter.
pub fn init_logging() -> Result<LogGuard> {
    let dir = std::env::var(ENV_LOG_DIR)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

    let (writer, worker) = tracing_appender::non_blocking(log_appender(&dir)?);

    tracing_subscriber::registry()
        .with(build_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(fmt::layer().json().with_writer(writer))
        .with(fmt::layer().with_target(false).with_writer(std::io::stdout))
        .try_init()
        .map_err(|e| ScraperError::Config(format!("logging already initialized: {e}")))?;

    Ok(LogGuard { _worker: worker, dir })
}

fn log_appender(dir: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    std::fs::create_dir_all(dir)?;
    Ok(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
}

/// Unparsable directives fall back to the default filter.
fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
