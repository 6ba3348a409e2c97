//! Tracing initialization for embedding binaries and test runs.
//!
//! The library itself only emits (`log` records plus a few `tracing` spans);
//! installing a subscriber is the host application's call.

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber with `RUST_LOG`-style filtering and
/// bridges `log` records into `tracing`. Safe to call repeatedly; later calls
/// are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
