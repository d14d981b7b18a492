//! Logging setup shared by the library's callers.

use std::path::Path;

use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vcbox_shared::errors::{VcboxError, VcboxResult};

pub use tracing_appender::non_blocking::WorkerGuard;

/// File name prefix of the rolling log.
pub const LOG_FILE_NAME: &str = "vcbox.log";

/// Initialize tracing with file logging.
///
/// Logs go to `{logs_dir}/vcbox.log.<date>` with daily rotation. The filter
/// comes from `RUST_LOG` and defaults to `info`. Keep the returned guard
/// alive for as long as logs should be flushed.
pub fn init_logging(logs_dir: &Path) -> VcboxResult<WorkerGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        VcboxError::Config(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| VcboxError::Config(format!("Invalid log filter: {}", e)))?;

    register_to_tracing(non_blocking, env_filter);
    Ok(guard)
}

/// Install a plain-text subscriber writing to `non_blocking`.
///
/// A subscriber that is already installed wins; this is then a no-op.
pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_creates_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let logs = temp.path().join("nested").join("logs");
        let guard = init_logging(&logs).unwrap();
        tracing::info!("logging initialized");
        drop(guard);
        assert!(logs.is_dir());
    }
}
