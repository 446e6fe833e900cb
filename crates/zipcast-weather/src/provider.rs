//! api.weather.gov client.
//!
//! Forecasts take two requests: `/points/{lat},{lng}` names the gridpoint
//! forecast URL for a coordinate, and that URL returns the periods.

use serde::Deserialize;
use tracing::instrument;

use zipcast_services::{ApiClient, HttpError, RetryError};

use crate::types::{Coordinate, ForecastLocation, RawPeriod};

pub const DEFAULT_NWS_URL: &str = "https://api.weather.gov";

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("forecast metadata lookup failed: {0}")]
    Metadata(#[source] RetryError<HttpError>),

    #[error("forecast periods lookup failed: {0}")]
    Periods(#[source] RetryError<HttpError>),
}

impl ForecastError {
    /// The last HTTP-level failure behind this error
    pub fn cause(&self) -> &HttpError {
        match self {
            ForecastError::Metadata(e) | ForecastError::Periods(e) => e.cause(),
        }
    }

    /// True when the upstream answered but the payload lacked what we need
    pub fn is_malformed(&self) -> bool {
        matches!(self.cause(), HttpError::Malformed(_))
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: Option<PointProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    forecast: Option<String>,
    relative_location: Option<RelativeLocation>,
    radar_station: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelativeLocation {
    properties: Option<RelativeLocationProperties>,
}

#[derive(Debug, Deserialize)]
struct RelativeLocationProperties {
    city: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: Option<ForecastProperties>,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Option<Vec<RawPeriod>>,
}

/// What the points endpoint says about a coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointMetadata {
    pub forecast_url: String,
    pub location: ForecastLocation,
}

fn point_metadata(body: PointsResponse) -> Result<PointMetadata, HttpError> {
    let properties = body
        .properties
        .ok_or_else(|| HttpError::Malformed("points response has no properties".into()))?;

    let forecast_url = properties
        .forecast
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| HttpError::Malformed("points response has no forecast URL".into()))?;

    let (city, state) = match properties.relative_location.and_then(|r| r.properties) {
        Some(p) => (p.city, p.state),
        None => (None, None),
    };

    Ok(PointMetadata {
        forecast_url,
        location: ForecastLocation {
            city,
            state,
            radar_station: properties.radar_station,
        },
    })
}

fn periods_of(body: ForecastResponse) -> Result<Vec<RawPeriod>, HttpError> {
    body.properties
        .and_then(|p| p.periods)
        .ok_or_else(|| HttpError::Malformed("forecast response has no periods".into()))
}

/// Weather provider for api.weather.gov
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    api: ApiClient,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(api: ApiClient) -> Self {
        Self::new_with_base_url(api, DEFAULT_NWS_URL)
    }

    /// Create a provider against another host (useful for testing)
    pub fn new_with_base_url(api: ApiClient, base_url: &str) -> Self {
        Self {
            api,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Step 1: resolve the forecast URL and location for a coordinate.
    #[instrument(skip(self, coordinate), fields(coordinate = %coordinate), level = "info")]
    pub async fn fetch_point(&self, coordinate: Coordinate) -> Result<PointMetadata, ForecastError> {
        let url = format!("{}/points/{}", self.base_url, coordinate);

        self.api
            .get_with_retry(&url, point_metadata)
            .await
            .map_err(ForecastError::Metadata)
    }

    /// Step 2: fetch the ordered period list.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_periods(&self, forecast_url: &str) -> Result<Vec<RawPeriod>, ForecastError> {
        let periods = self
            .api
            .get_with_retry(forecast_url, periods_of)
            .await
            .map_err(ForecastError::Periods)?;

        tracing::debug!("Received {} forecast periods", periods.len());
        Ok(periods)
    }

    /// Both steps for one coordinate.
    pub async fn fetch(
        &self,
        coordinate: Coordinate,
    ) -> Result<(ForecastLocation, Vec<RawPeriod>), ForecastError> {
        let point = self.fetch_point(coordinate).await?;
        let periods = self.fetch_periods(&point.forecast_url).await?;
        Ok((point.location, periods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zipcast_services::RetryConfig;

    fn provider(base: &str) -> WeatherProvider {
        let api = ApiClient::new("zipcast-test/1.0", Duration::from_secs(5), RetryConfig::new(1, 1, 2))
            .unwrap();
        WeatherProvider::new_with_base_url(api, base)
    }

    fn nyc() -> Coordinate {
        Coordinate::rounded(40.7506, -73.9972).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_point_reads_forecast_url_and_location() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/40.7506,-73.9972"))
            .and(header("User-Agent", "zipcast-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "forecast": "https://api.weather.gov/gridpoints/OKX/33,37/forecast",
                    "relativeLocation": {
                        "properties": {"city": "Hoboken", "state": "NJ"}
                    },
                    "radarStation": "KDIX"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let point = provider(&mock_server.uri()).fetch_point(nyc()).await.unwrap();

        assert_eq!(point.forecast_url, "https://api.weather.gov/gridpoints/OKX/33,37/forecast");
        assert_eq!(point.location.label().as_deref(), Some("Hoboken, NJ"));
        assert_eq!(point.location.radar_station.as_deref(), Some("KDIX"));
    }

    #[tokio::test]
    async fn test_fetch_point_tolerates_missing_location() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/40.7506,-73.9972"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"forecast": "https://example.test/forecast"}
            })))
            .mount(&mock_server)
            .await;

        let point = provider(&mock_server.uri()).fetch_point(nyc()).await.unwrap();
        assert_eq!(point.location, ForecastLocation::default());
    }

    #[tokio::test]
    async fn test_missing_forecast_url_is_malformed_after_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/40.7506,-73.9972"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"radarStation": "KOKX"}
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server.uri()).fetch_point(nyc()).await.unwrap_err();
        assert!(matches!(err, ForecastError::Metadata(_)));
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_fetch_periods_keeps_upstream_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/OKX/33,37/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "periods": [
                        {"number": 1, "name": "Tonight", "shortForecast": "Mostly Clear",
                         "temperature": 55, "temperatureUnit": "F"},
                        {"number": 2, "name": "Saturday", "shortForecast": "Sunny",
                         "temperature": 72, "temperatureUnit": "F",
                         "detailedForecast": "Sunny, with a high near 72."}
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let url = format!("{}/gridpoints/OKX/33,37/forecast", mock_server.uri());
        let periods = provider(&mock_server.uri()).fetch_periods(&url).await.unwrap();

        let names: Vec<&str> = periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tonight", "Saturday"]);
        assert_eq!(periods[1].detailed_forecast.as_deref(), Some("Sunny, with a high near 72."));
    }

    #[tokio::test]
    async fn test_periods_that_are_not_a_list_fail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"periods": "soon"}
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let url = format!("{}/forecast", mock_server.uri());
        let err = provider(&mock_server.uri()).fetch_periods(&url).await.unwrap_err();
        assert!(matches!(err, ForecastError::Periods(_)));
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_fetch_runs_both_steps() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/40.7506,-73.9972"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"forecast": format!("{}/gridpoints/OKX/33,37/forecast", mock_server.uri())}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/OKX/33,37/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"periods": []}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (location, periods) = provider(&mock_server.uri()).fetch(nyc()).await.unwrap();
        assert_eq!(location, ForecastLocation::default());
        assert!(periods.is_empty());
    }
}
