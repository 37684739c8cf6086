//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Honour `RUST_LOG` before the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Safe to call more than once; later calls are ignored

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise `level` for this crate and tower_http.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("rules_proxy={level},tower_http={level}"))
    })
}

/// Install the global subscriber.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
