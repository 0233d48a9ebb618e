//! Transport adapters over the dispatcher
//!
//! The dispatcher itself speaks `(method, path, headers, body)` →
//! `(status, body)`; exposures bind that contract to a concrete transport.

pub mod rest;

pub use rest::RestExposure;

/// Install a tracing subscriber driven by `RUST_LOG`.
///
/// Convenience for binaries; call once before serving.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
