//! Logging setup with `tracing` and `tracing-subscriber`.
//!
//! `RUST_LOG` sets the filter (default: `info`), e.g.
//! `RUST_LOG=formulary=debug`.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Call once from the binary.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Subscriber for tests; safe to call from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
