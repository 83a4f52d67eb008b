//! Structured logging setup, initialized once per process.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the global `tracing` subscriber. Safe to call once per
/// process; later calls are ignored (matches the teacher's `init_tracing`
/// call site in each service's `bin/server.rs`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
