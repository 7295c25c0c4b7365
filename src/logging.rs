//! Log subscriber setup
//!
//! Exporter output goes through `tracing`, so a host needs a subscriber
//! installed to see it. On Cloud Run (`K_SERVICE` set) records are written in
//! the structured format Cloud Logging expects; elsewhere they are written as
//! plain text.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable Cloud Run sets to the service name.
pub const SERVICE_ENV: &str = "K_SERVICE";

const DEFAULT_LEVEL: &str = "info";

/// Install the global subscriber, honouring `RUST_LOG` (default `info`).
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Use
/// [`try_init_logging`] when that can happen.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    install(filter).init();
}

/// Install the global subscriber with a fixed filter directive.
pub fn init_logging_with_level(level: &str) {
    install(EnvFilter::new(level)).init();
}

/// Like [`init_logging`], but fails instead of panicking when a subscriber
/// is already installed.
pub fn try_init_logging() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    install(filter).try_init()
}

/// Whether the process runs on a managed serverless platform.
pub fn is_managed_serverless() -> bool {
    std::env::var(SERVICE_ENV).is_ok_and(|v| !v.is_empty())
}

type Boxed = Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync>;

fn install(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(output_layer(is_managed_serverless()))
        .with(filter)
}

fn output_layer(structured: bool) -> Boxed {
    #[cfg(feature = "stackdriver")]
    if structured {
        return Box::new(tracing_stackdriver::layer());
    }

    #[cfg(not(feature = "stackdriver"))]
    if structured {
        return Box::new(tracing_subscriber::fmt::layer().json());
    }

    Box::new(tracing_subscriber::fmt::layer().with_target(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_layer_builds_for_both_modes() {
        let _ = output_layer(true);
        let _ = output_layer(false);
    }

    #[test]
    fn test_second_install_fails() {
        // The first call may lose to another test in this binary
        let _ = try_init_logging();
        assert!(try_init_logging().is_err());
    }
}
