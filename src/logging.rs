use std::fs;
use std::io;
use std::path::Path;

use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, registry, Layer};

pub fn init_std_out_logging() -> DefaultGuard {
    let collector = registry().with(
        fmt::Layer::new()
            .with_writer(io::stdout)
            .with_filter(LevelFilter::INFO),
    );
    tracing::subscriber::set_default(collector)
}

/// Logs to stdout and additionally to a json log file in `dir`. The worker
/// guard must stay alive until the process is done, otherwise buffered log
/// lines are lost.
pub fn init_file_logging(dir: &Path) -> io::Result<(DefaultGuard, WorkerGuard)> {
    fs::create_dir_all(dir)?;
    let file_appender = rolling::never(dir, "rewrite_plans_log.txt");
    let (log_file, log_guard) = non_blocking(file_appender);

    let collector = registry()
        .with(
            fmt::Layer::new()
                .with_writer(log_file)
                .json()
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::Layer::new()
                .with_writer(io::stdout)
                .with_filter(LevelFilter::INFO),
        );
    Ok((tracing::subscriber::set_default(collector), log_guard))
}
