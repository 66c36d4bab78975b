//! Tracing subscriber setup for the binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::DEFAULT_LOG_FILTER;

/// Parses `directives`, falling back to the default filter when they are invalid.
#[must_use]
pub fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs a stderr formatter filtered by `directives`. Fails if a global
/// subscriber is already set.
pub fn init(directives: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(directives))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
}
