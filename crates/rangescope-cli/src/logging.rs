use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RANGESCOPE_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays usable
/// for `--json` output.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
