//! Logging initialisation.

use crate::core::config::LoggingConfig;
use crate::core::{MetricsError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "METRON_LOG";

/// Install the global tracing subscriber.
///
/// `METRON_LOG` takes precedence over `config.level` and accepts any
/// `EnvFilter` directive string.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.structured {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).compact())
            .try_init()
    };

    result.map_err(|e| MetricsError::config(format!("Failed to initialize logging: {}", e)))
}
