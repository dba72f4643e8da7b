use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{Config, LogFormat};

pub const LOG_FILE_PREFIX: &str = "imobiliaria.log";

fn filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER))
}

/// Install the global subscriber: stdout (pretty or JSON) plus, when `LOG_DIR`
/// is set, a daily-rotated JSON file. Keep the returned guard alive to flush the file sink.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let stdout = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .boxed(),
    };

    let (file, guard) = match config.log_dir.as_deref().map(file_layer) {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(file)
        .with(stdout)
        .with(filter(&config.log_filter))
        .try_init();
    guard
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn file_layer(dir: &Path) -> (BoxedLayer, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer)
        .boxed();
    (layer, guard)
}
