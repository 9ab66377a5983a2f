//! Tracing setup for the server binary.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, with a sensible default
/// otherwise. Safe to call once at startup.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ltigate=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
