//! Observability: metrics registry and tracing setup.

pub mod metrics;

pub use metrics::BridgeMetrics;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber, filtered by `RUST_LOG`.
/// Falls back to `default_filter` when the variable is unset.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt().with_env_filter(filter).try_init();
}
