use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `TAWK_LOG=debug`
pub const LOG_ENV: &str = "TAWK_LOG";

/// Installs the stderr subscriber. Only warnings show unless `TAWK_LOG`
/// says otherwise; calling this twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
