//! Tracing setup for the bot binary. Reads `RUST_LOG` for the filter and, when `LOG_DIR` is
//! set, appends rolling daily log files there instead of writing to stdout; the host process
//! that embeds this plugin owns stdout/stderr, so plugin logs never share that stream.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Keeps the non-blocking file appender's worker thread alive; dropping it flushes pending
/// records. The caller must hold this for the lifetime of `main`.
pub struct TracingGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

/// Initializes the global tracing subscriber.
///
/// * `LOG_DIR` unset: logs go to stdout with ANSI colors.
/// * `LOG_DIR` set: logs roll daily into `<LOG_DIR>/<file_prefix>.log.YYYY-MM-DD`, plain text.
pub fn init_tracing(file_prefix: &str) -> TracingGuard {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match std::env::var("LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(Path::new(&dir), file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false).with_filter(filter);
            tracing_subscriber::registry().with(file_layer).init();
            tracing::info!(dir = %dir, "tracing initialized to file");
            TracingGuard(Some(guard))
        }
        Err(_) => {
            let stdout_layer = tracing_subscriber::fmt::layer().with_filter(filter);
            tracing_subscriber::registry().with(stdout_layer).init();
            TracingGuard(None)
        }
    }
}
