//! Process-wide log and trace setup.

use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the tracing subscriber and bridges `log` macro output into it.
///
/// Filtering comes from `RUST_LOG`, defaulting to info for this crate.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = LogTracer::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ledgerscan=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
