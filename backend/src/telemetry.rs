//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{AppError, AppResult};

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber. RUST_LOG takes precedence over the configured filter.
pub fn init(config: &LoggingConfig) -> AppResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| AppError::Configuration(format!("logging: {}", e)))
}

/// Subscriber for tests; safe to call more than once
pub fn init_test() {
    let _ = tracing_subscriber::registry()
        .with(env_filter(&LoggingConfig::default()))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
