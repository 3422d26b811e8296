// Define a new module for logging initialization
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. `RUST_LOG` wins over the defaults.
///
/// The server keeps `info` logs by default; CLI commands stay quiet unless
/// `verbose` is set.
pub fn init_logging(verbose: bool, server: bool) {
    let (level_filter, level) = match (verbose, server) {
        (true, _) => (LevelFilter::DEBUG, "debug"),
        (false, true) => (LevelFilter::INFO, "info"),
        (false, false) => (LevelFilter::OFF, "off"),
    };
    let app_filter = Targets::new()
        .with_target("quotevault", level_filter)
        .with_target("tower_http", level_filter);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with((!server).then(|| fmt::layer().pretty().without_time()))
        .with(server.then(|| fmt::layer().compact()))
        .with(app_filter)
        .with(env_filter)
        .init();
}
