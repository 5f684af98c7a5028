use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// `RUST_LOG` overrides the console level.
const LOG_ENV_VAR: &str = "RUST_LOG";

/// Console output goes to stderr at `console_level`. With `log_path`, events
/// are also appended to that file at `file_level`. The returned guard flushes
/// the file when dropped and must be kept alive until exit.
pub fn init_logging(
    console_level: LevelFilter,
    log_path: Option<&Path>,
    file_level: LevelFilter,
) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let Some(log_path) = log_path else {
        tracing_subscriber::registry().with(console).try_init()?;
        return Ok(None);
    };

    if let Some(parent) = log_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false).with_filter(file_level);

    tracing_subscriber::registry().with(console).with(file_layer).try_init()?;

    Ok(Some(guard))
}
