//! Logging setup utilities.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Sets up logging for the binary and every crate it pulls in. The default
/// filter applies `default_log_level` globally, so library crates (where the
/// realtime core logs) are covered, not just the binary target. The filter
/// can be overridden with the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "chat")
/// * `default_log_level` - The default log level (e.g., "debug", "info")
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the default filter directives: a bare global level plus an explicit
/// directive for the binary target.
fn default_directives(binary_name: &str, default_log_level: &str) -> String {
    format!("{default_log_level},{binary_name}={default_log_level}")
}
