//! Tracing subscriber setup

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. When `log_dir` is given, a
/// daily-rolling file named `<file_prefix>.log` is written alongside the
/// console output; keep the returned guard alive for as long as logs should
/// be flushed.
pub fn init_logging(
    log_level: &str,
    log_dir: Option<&Path>,
    file_prefix: &str,
) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| Error::validation(format!("invalid log level '{}': {}", log_level, e)))?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender =
                RollingFileAppender::new(Rotation::DAILY, dir, format!("{}.log", file_prefix));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}
