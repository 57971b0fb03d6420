use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "attend";
const DEFAULT_LEVEL: LevelFilter = LevelFilter::DEBUG;

/// Filter for this crate's events. An explicit level wins over `RUST_LOG`, which in turn wins
/// over [DEFAULT_LEVEL].
fn crate_filter(log_level: Option<LevelFilter>) -> EnvFilter {
    let directive = |level: LevelFilter| {
        EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace('-', "_")
        ))
    };
    match log_level {
        Some(level) => directive(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| directive(DEFAULT_LEVEL)),
    }
}

/// Sends logs into daily rotated files under `<application_data_path>/logs`, keeping the last
/// five. With `verbose` the events are echoed to stdout at trace level as well.
pub fn enable_logging(application_data_path: &Path, verbose: bool) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(application_data_path.join("logs"))?;

    let stdout = std::io::stdout.with_filter(move |_| verbose);
    let level = verbose.then_some(LevelFilter::TRACE);

    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(level))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stdout.and(appender))
        .pretty()
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
