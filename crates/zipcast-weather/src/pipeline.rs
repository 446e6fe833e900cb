//! ZIP code in, classified forecast out.

use std::time::Duration;

use tracing::instrument;

use zipcast_core::{Config, RetrySettings};
use zipcast_services::{ApiClient, HttpError, RetryConfig};

use crate::assemble::assemble;
use crate::cache::GeocodeCache;
use crate::geocode::{GeocodeError, GeocodeProvider};
use crate::provider::{ForecastError, WeatherProvider};
use crate::resolver::GeocodeResolver;
use crate::types::{ForecastReport, ZipCode};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not determine location for ZIP {zip}: {source}")]
    GeocodeUnavailable {
        zip: ZipCode,
        #[source]
        source: GeocodeError,
    },

    #[error("could not retrieve forecast: {0}")]
    ForecastUnavailable(#[from] ForecastError),
}

/// Retry policy described by the `[retry]` config section
pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig::new(
        settings.max_retries,
        settings.initial_delay_ms,
        settings.max_delay_ms,
    )
}

/// Shared HTTP client described by the `[forecast]` and `[retry]` sections
pub fn api_client(config: &Config) -> Result<ApiClient, HttpError> {
    ApiClient::new(
        &config.forecast.user_agent,
        Duration::from_secs(config.forecast.timeout_secs),
        retry_config(&config.retry),
    )
}

#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    resolver: GeocodeResolver,
    weather: WeatherProvider,
}

impl ForecastPipeline {
    pub fn new(resolver: GeocodeResolver, weather: WeatherProvider) -> Self {
        Self { resolver, weather }
    }

    /// Wire every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self, HttpError> {
        let api = api_client(config)?;

        let cache = GeocodeCache::new(config.cache.path.clone());
        let provider = GeocodeProvider::from_config(&config.geocode, api.clone());
        let weather = WeatherProvider::new_with_base_url(api, &config.forecast.nws_url);

        Ok(Self::new(GeocodeResolver::new(cache, provider), weather))
    }

    pub fn resolver(&self) -> &GeocodeResolver {
        &self.resolver
    }

    /// Geocode, fetch, classify and limit. Geocoding finishes before any
    /// forecast request is made.
    #[instrument(skip(self, zip), fields(zip = %zip))]
    pub async fn run(&self, zip: &ZipCode, limit: Option<usize>) -> Result<ForecastReport, PipelineError> {
        let coordinate = self
            .resolver
            .resolve(zip)
            .await
            .map_err(|source| PipelineError::GeocodeUnavailable {
                zip: zip.clone(),
                source,
            })?;

        let (location, periods) = self.weather.fetch(coordinate).await?;
        let forecast = assemble(periods, limit);

        tracing::info!("Assembled {} forecast periods for {}", forecast.len(), zip);

        Ok(ForecastReport {
            zip: zip.clone(),
            coordinate,
            location,
            forecast,
        })
    }
}
