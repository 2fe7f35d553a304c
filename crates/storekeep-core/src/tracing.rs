//! Logging utilities with segment prefixes.
//!
//! The client and engines log lifecycle events (opens, upgrades, deletions)
//! at `debug`/`trace`. Failures are returned to the caller, never logged.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format suitable for terminal output
///
/// Does nothing if a global subscriber is already installed, so test
/// harnesses may call it from every test.
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_test_writer())
        .try_init();
}

/// Segment prefixes for logging.
pub mod prefix {
    /// Database operations prefix
    pub const DB: &str = "⊔";
    /// Schema upgrade prefix
    pub const UPGRADE: &str = "✿";
}
