//! # Structured Logging Module
//!
//! Environment-aware tracing initialization shared by the server binary and
//! integration harnesses.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Respects `RUST_LOG` when set; otherwise falls back to a per-environment
/// default (`debug` in development, `info` elsewhere).
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let default_level = default_log_level(&environment);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        // Don't panic if a subscriber is already installed (tests).
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .try_init();
    });
}

fn get_environment() -> String {
    std::env::var("STOREFRONT_ENV").unwrap_or_else(|_| "development".to_string())
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "development" => "debug",
        "test" => "warn",
        _ => "info",
    }
}
