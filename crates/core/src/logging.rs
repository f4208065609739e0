//! Structured logging infrastructure for NodeInit.
//!
//! `RUST_LOG` always wins over the configured level so operators can raise
//! verbosity without touching the config file.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggerConfig;
use crate::{Error, Result};

/// Install the global subscriber described by `config`.
///
/// Fails if the level directive is invalid or a subscriber is already set.
///
/// # Example
/// ```no_run
/// use nodeinit_core::{config::LoggerConfig, logging};
///
/// logging::init(&LoggerConfig::default()).unwrap();
/// tracing::info!("agent started");
/// ```
pub fn init(config: &LoggerConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };
    installed.map_err(|e| Error::Logging(e.to_string()))?;

    tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    Ok(())
}

fn filter_for(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| Error::Logging(format!("invalid log level '{}': {}", level, e)))
}
