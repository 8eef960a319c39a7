//! Structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the crate logs at the configured
//! level and tower-http at debug.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn default_filter(level: &str) -> String {
    format!("storefront_api={level},tower_http=debug")
}

/// Initialize the global tracing subscriber. Safe to call once per process.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
