//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber once at startup
//! - Pick the filter from `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Human-readable fmt output on stdout
//! - Repeated initialization (tests) is a no-op

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("rpc_gateway={level},warn")
}

/// Install the fmt subscriber. Returns false if one was already installed.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_scopes_level_to_crate() {
        assert_eq!(default_filter("debug"), "rpc_gateway=debug,warn");
    }

    #[test]
    fn second_init_is_harmless() {
        init_logging("info");
        assert!(!init_logging("info"));
    }
}
