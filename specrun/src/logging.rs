//! Diagnostic tracing for the CLI.
//!
//! Events go to stderr so stdout stays reserved for command output (progress
//! tables, plans, reports). Persisted run artifacts are written by
//! [`crate::io::run_log`] and are unaffected by the log level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; when unset the level is `warn`, or `debug` with
/// `verbose`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=specrun=debug specrun run --spec specs.yaml
/// ```
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second initialization (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
