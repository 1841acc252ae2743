//! Optional `tracing` subscriber setup for binaries embedding the pipeline.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`, defaulting to
/// `info` for this crate. Call once, early, from the embedding binary.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("permafrost=info")),
        )
        .init();
}
