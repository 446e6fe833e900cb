//! Forward geocoding: convert a ZIP code to coordinates.
//!
//! Two interchangeable providers:
//! - Zippopotam.us: free, no API key required
//! - Google Geocoding: needs an API key

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use zipcast_core::{GeocodeConfig, ProviderChoice};
use zipcast_services::{ApiClient, HttpError, RetryError};

use crate::types::{Coordinate, ZipCode};

/// Geocoding errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("no location found for ZIP {0}")]
    NotFound(ZipCode),

    #[error("ZIP {zip} matched {count} locations")]
    Ambiguous { zip: ZipCode, count: usize },

    #[error("no Google API key configured")]
    MissingCredential,

    #[error("Google API key rejected: {0}")]
    CredentialRejected(String),

    #[error("geocoder returned unusable coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("invalid geocoder URL: {0}")]
    Endpoint(String),

    #[error("geocoding request failed: {0}")]
    Provider(#[from] RetryError<HttpError>),
}

#[derive(Debug, Deserialize)]
struct ZippopotamResponse {
    #[serde(default)]
    places: Vec<ZippopotamPlace>,
}

#[derive(Debug, Deserialize)]
struct ZippopotamPlace {
    latitude: String,
    longitude: String,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// Keyless provider backed by api.zippopotam.us
#[derive(Debug, Clone)]
pub struct ZippopotamProvider {
    api: ApiClient,
    base_url: String,
}

impl ZippopotamProvider {
    pub fn new(api: ApiClient, base_url: &str) -> Self {
        Self {
            api,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, zip), fields(zip = %zip), level = "info")]
    pub async fn locate(&self, zip: &ZipCode) -> Result<Coordinate, GeocodeError> {
        let url = format!("{}/us/{}", self.base_url, zip);

        let places = match self
            .api
            .get_with_retry(&url, |body: ZippopotamResponse| Ok(body.places))
            .await
        {
            Ok(places) => places,
            // Zippopotam answers unknown ZIPs with 404 and an empty object
            Err(RetryError::Permanent(e)) if e.status() == Some(StatusCode::NOT_FOUND) => {
                return Err(GeocodeError::NotFound(zip.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let place = single_candidate(zip, places)?;
        let latitude = parse_degrees(&place.latitude)?;
        let longitude = parse_degrees(&place.longitude)?;

        accept(latitude, longitude)
    }
}

/// Keyed provider backed by the Google Geocoding API
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    api: ApiClient,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleProvider {
    pub fn new(api: ApiClient, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            api,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, zip), fields(zip = %zip), level = "info")]
    pub async fn locate(&self, zip: &ZipCode) -> Result<Coordinate, GeocodeError> {
        let api_key = self.api_key.as_deref().ok_or(GeocodeError::MissingCredential)?;

        let mut url = Url::parse(&format!("{}/maps/api/geocode/json", self.base_url))
            .map_err(|e| GeocodeError::Endpoint(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("address", zip.as_str())
            .append_pair("key", api_key);

        let results = self
            .api
            .get_with_retry(url.as_str(), google_results)
            .await
            .map_err(|e| match e {
                RetryError::Permanent(HttpError::Rejected(msg)) => {
                    GeocodeError::CredentialRejected(msg)
                }
                other => GeocodeError::Provider(other),
            })?;

        let result = single_candidate(zip, results)?;
        accept(result.geometry.location.lat, result.geometry.location.lng)
    }
}

/// Map Google's in-body status onto the retry taxonomy.
fn google_results(body: GoogleResponse) -> Result<Vec<GoogleResult>, HttpError> {
    let GoogleResponse {
        status,
        results,
        error_message,
    } = body;
    let detail = match error_message {
        Some(msg) => format!("{}: {}", status, msg),
        None => status.clone(),
    };

    match status.as_str() {
        "OK" => Ok(results),
        "ZERO_RESULTS" => Ok(Vec::new()),
        "REQUEST_DENIED" | "INVALID_REQUEST" | "OVER_DAILY_LIMIT" => Err(HttpError::Rejected(detail)),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(HttpError::Unavailable(detail)),
        _ => Err(HttpError::Malformed(format!("unexpected status {}", detail))),
    }
}

/// Exactly one candidate is usable; none or several is a failure.
fn single_candidate<T>(zip: &ZipCode, mut candidates: Vec<T>) -> Result<T, GeocodeError> {
    match candidates.len() {
        0 => Err(GeocodeError::NotFound(zip.clone())),
        1 => Ok(candidates.remove(0)),
        count => Err(GeocodeError::Ambiguous {
            zip: zip.clone(),
            count,
        }),
    }
}

fn parse_degrees(raw: &str) -> Result<f64, GeocodeError> {
    raw.trim()
        .parse()
        .map_err(|_| GeocodeError::InvalidCoordinates(raw.to_string()))
}

fn accept(latitude: f64, longitude: f64) -> Result<Coordinate, GeocodeError> {
    Coordinate::rounded(latitude, longitude)
        .ok_or_else(|| GeocodeError::InvalidCoordinates(format!("{}, {}", latitude, longitude)))
}

/// The geocoding provider in use, chosen once per process.
#[derive(Debug, Clone)]
pub enum GeocodeProvider {
    /// No credential needed (Zippopotam.us)
    Keyless(ZippopotamProvider),

    /// Credential required (Google)
    Keyed(GoogleProvider),
}

impl GeocodeProvider {
    /// Pick a provider from configuration, loading the API key once.
    pub fn from_config(config: &GeocodeConfig, api: ApiClient) -> Self {
        Self::select(config.provider, config.api_key(), config, api)
    }

    /// Pick a provider for an explicit choice and credential.
    ///
    /// `Auto` prefers the keyed provider when a key is present.
    pub fn select(
        choice: ProviderChoice,
        api_key: Option<String>,
        config: &GeocodeConfig,
        api: ApiClient,
    ) -> Self {
        let provider = match choice {
            ProviderChoice::Zippopotam => Self::keyless(api, &config.zippopotam_url),
            ProviderChoice::Google => Self::Keyed(GoogleProvider::new(api, &config.google_url, api_key)),
            ProviderChoice::Auto => match api_key {
                Some(key) if !key.trim().is_empty() => {
                    Self::Keyed(GoogleProvider::new(api, &config.google_url, Some(key)))
                }
                _ => Self::keyless(api, &config.zippopotam_url),
            },
        };

        tracing::debug!("Using {} geocoding provider", provider.name());
        provider
    }

    fn keyless(api: ApiClient, base_url: &str) -> Self {
        Self::Keyless(ZippopotamProvider::new(api, base_url))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyless(_) => "zippopotam",
            Self::Keyed(_) => "google",
        }
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, Self::Keyed(_))
    }

    /// Look up coordinates for `zip`, already rounded.
    pub async fn locate(&self, zip: &ZipCode) -> Result<Coordinate, GeocodeError> {
        match self {
            Self::Keyless(provider) => provider.locate(zip).await,
            Self::Keyed(provider) => provider.locate(zip).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zipcast_services::RetryConfig;

    fn api() -> ApiClient {
        ApiClient::new("zipcast-test/1.0", Duration::from_secs(5), RetryConfig::new(2, 1, 2)).unwrap()
    }

    fn zip(s: &str) -> ZipCode {
        ZipCode::parse(s).unwrap()
    }

    fn place(lat: &str, lng: &str) -> serde_json::Value {
        serde_json::json!({
            "place name": "New York City",
            "longitude": lng,
            "state": "New York",
            "state abbreviation": "NY",
            "latitude": lat
        })
    }

    #[tokio::test]
    async fn test_zippopotam_single_place() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us/10001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "post code": "10001",
                "country": "United States",
                "places": [place("40.750649", "-73.997151")]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = ZippopotamProvider::new(api(), &mock_server.uri());
        let coord = provider.locate(&zip("10001")).await.unwrap();

        assert_eq!(coord.latitude(), 40.7506);
        assert_eq!(coord.longitude(), -73.9972);
    }

    #[tokio::test]
    async fn test_zippopotam_unknown_zip_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us/00000"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = ZippopotamProvider::new(api(), &mock_server.uri());
        let err = provider.locate(&zip("00000")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_zippopotam_multiple_places_is_ambiguous() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us/12345"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "places": [place("42.8142", "-73.9396"), place("42.8000", "-73.9000")]
            })))
            .mount(&mock_server)
            .await;

        let provider = ZippopotamProvider::new(api(), &mock_server.uri());
        let err = provider.locate(&zip("12345")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_zippopotam_garbage_coordinates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us/10001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "places": [place("north", "-73.9972")]
            })))
            .mount(&mock_server)
            .await;

        let provider = ZippopotamProvider::new(api(), &mock_server.uri());
        let err = provider.locate(&zip("10001")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::InvalidCoordinates(_)));
    }

    #[tokio::test]
    async fn test_google_sends_key_and_rounds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .and(query_param("address", "94103"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": 37.772_549_9, "lng": -122.414_699_9}}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = GoogleProvider::new(api(), &mock_server.uri(), Some("secret".into()));
        let coord = provider.locate(&zip("94103")).await.unwrap();

        assert_eq!(coord.latitude(), 37.7725);
        assert_eq!(coord.longitude(), -122.4147);
    }

    #[tokio::test]
    async fn test_google_without_key_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = GoogleProvider::new(api(), &mock_server.uri(), Some("   ".into()));
        assert!(!provider.has_credential());
        let err = provider.locate(&zip("94103")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::MissingCredential));
    }

    #[tokio::test]
    async fn test_google_request_denied_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid.",
                "results": []
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = GoogleProvider::new(api(), &mock_server.uri(), Some("bad".into()));
        let err = provider.locate(&zip("94103")).await.unwrap_err();
        match err {
            GeocodeError::CredentialRejected(msg) => assert!(msg.contains("invalid")),
            other => panic!("expected CredentialRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_google_over_query_limit_is_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OVER_QUERY_LIMIT",
                "results": []
            })))
            .expect(3)
            .mount(&mock_server)
            .await;

        let provider = GoogleProvider::new(api(), &mock_server.uri(), Some("key".into()));
        let err = provider.locate(&zip("94103")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Provider(RetryError::Exhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_google_multiple_results_is_ambiguous() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [
                    {"geometry": {"location": {"lat": 42.8142, "lng": -73.9396}}},
                    {"geometry": {"location": {"lat": 42.8100, "lng": -73.9400}}}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = GoogleProvider::new(api(), &mock_server.uri(), Some("key".into()));
        let err = provider.locate(&zip("12345")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_google_zero_results_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ZERO_RESULTS",
                "results": []
            })))
            .mount(&mock_server)
            .await;

        let provider = GoogleProvider::new(api(), &mock_server.uri(), Some("key".into()));
        let err = provider.locate(&zip("99999")).await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(_)));
    }

    #[test]
    fn test_select_auto_prefers_keyed_provider() {
        let config = GeocodeConfig::default();

        let keyed = GeocodeProvider::select(ProviderChoice::Auto, Some("k".into()), &config, api());
        assert!(keyed.is_keyed());

        let keyless = GeocodeProvider::select(ProviderChoice::Auto, None, &config, api());
        assert_eq!(keyless.name(), "zippopotam");

        let forced = GeocodeProvider::select(ProviderChoice::Zippopotam, Some("k".into()), &config, api());
        assert!(!forced.is_keyed());

        let forced_google = GeocodeProvider::select(ProviderChoice::Google, None, &config, api());
        assert_eq!(forced_google.name(), "google");
    }
}
