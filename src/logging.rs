//! Logging configuration using tracing
//!
//! Structured logging to stderr with RUST_LOG support.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// Filtering follows RUST_LOG when set; otherwise defaults to "warn" for
/// quiet CLI output, or "coursetrack=debug" when `verbose` is requested.
///
/// # Errors
/// Returns an error if a subscriber has already been initialized
pub fn init(verbose: bool) -> crate::Result<()> {
    let default_filter = if verbose { "coursetrack=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| {
            crate::CoursetrackError::Config(format!("Failed to initialize tracing: {}", e))
        })?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init(false);
}
