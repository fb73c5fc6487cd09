//! Tracing setup: compact console output plus a daily rolling log file
//! under the data directory.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::AppPaths;

/// Install the global subscriber. The returned guard flushes the file
/// writer on drop; the caller keeps it alive for the process lifetime.
pub fn init(paths: &AppPaths) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "docuchat.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    let console = fmt::layer().compact().with_target(false);
    let file = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}
