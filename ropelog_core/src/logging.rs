//! Tracing setup shared by the ropelog binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber: compact single-line output, filtered
/// by `RUST_LOG` when set and by [`DEFAULT_DIRECTIVES`] otherwise.
pub fn init() {
    init_with_level(DEFAULT_DIRECTIVES)
}

/// Install the global subscriber with an explicit fallback level for
/// when `RUST_LOG` is unset.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Debug-level subscriber routed through the test harness writer.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
