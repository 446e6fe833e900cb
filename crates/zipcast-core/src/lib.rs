pub mod config;
pub mod error;

pub use config::{
    CacheConfig, Config, ForecastConfig, GeocodeConfig, ProviderChoice, RetrySettings,
    ValidationResult, WebhookConfig,
};
pub use error::{AppError, ConfigError, DeliveryError, ForecastError, LocationError};

use anyhow::Result;

/// Initialize logging.
///
/// Logs go to stderr so stdout carries only the forecast.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("zipcast core initialized");
    Ok(())
}
