//! ZIP → coordinate resolution: cache first, provider on miss.

use tracing::instrument;

use crate::cache::GeocodeCache;
use crate::geocode::{GeocodeError, GeocodeProvider};
use crate::types::{Coordinate, ZipCode};

#[derive(Debug, Clone)]
pub struct GeocodeResolver {
    cache: GeocodeCache,
    provider: GeocodeProvider,
}

impl GeocodeResolver {
    pub fn new(cache: GeocodeCache, provider: GeocodeProvider) -> Self {
        Self { cache, provider }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn provider(&self) -> &GeocodeProvider {
        &self.provider
    }

    /// Resolve `zip` to a rounded coordinate.
    ///
    /// A cache hit returns without touching the network. A fresh provider
    /// result is appended to the cache; failing to persist it only logs.
    #[instrument(skip(self, zip), fields(zip = %zip))]
    pub async fn resolve(&self, zip: &ZipCode) -> Result<Coordinate, GeocodeError> {
        match self.cache.lookup_async(zip).await {
            Ok(Some(coordinate)) => {
                tracing::debug!("Geocode cache hit for {}: {}", zip, coordinate);
                return Ok(coordinate);
            }
            Ok(None) => tracing::debug!("Geocode cache miss for {}", zip),
            Err(e) => tracing::warn!("Geocode cache unreadable, asking provider: {}", e),
        }

        let coordinate = self.provider.locate(zip).await?;
        tracing::info!(
            "Resolved {} to {} via {}",
            zip,
            coordinate,
            self.provider.name()
        );

        if let Err(e) = self.cache.append_async(zip, coordinate).await {
            tracing::warn!("Failed to cache coordinates for {}: {}", zip, e);
        }

        Ok(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zipcast_services::{ApiClient, RetryConfig};

    use crate::geocode::ZippopotamProvider;

    fn keyless(base: &str) -> GeocodeProvider {
        let api = ApiClient::new("zipcast-test/1.0", Duration::from_secs(5), RetryConfig::new(1, 1, 2))
            .unwrap();
        GeocodeProvider::Keyless(ZippopotamProvider::new(api, base))
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".zip_cache");
        std::fs::write(&path, "60601,41.8858,-87.6181\n").unwrap();

        let resolver = GeocodeResolver::new(GeocodeCache::new(path), keyless(&mock_server.uri()));
        let coord = resolver.resolve(&ZipCode::parse("60601").unwrap()).await.unwrap();

        assert_eq!(coord, Coordinate::rounded(41.8858, -87.6181).unwrap());
    }

    #[tokio::test]
    async fn test_undecodable_cache_line_does_not_hide_hits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".zip_cache");
        std::fs::write(&path, b"\xff\xfe,1,2\n60601,41.8858,-87.6181\n").unwrap();

        let resolver = GeocodeResolver::new(GeocodeCache::new(&path), keyless(&mock_server.uri()));
        for _ in 0..3 {
            let coord = resolver.resolve(&ZipCode::parse("60601").unwrap()).await.unwrap();
            assert_eq!(coord, Coordinate::rounded(41.8858, -87.6181).unwrap());
        }

        // Nothing was re-appended
        let bytes = std::fs::read(&path).unwrap();
        let lines = bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
        assert_eq!(lines, 2);
    }

    #[tokio::test]
    async fn test_unwritable_cache_still_resolves() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/us/02134"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "places": [{"latitude": "42.3537", "longitude": "-71.1336"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        // The cache path is a directory: reads and appends both fail
        let dir = tempfile::tempdir().unwrap();
        let resolver = GeocodeResolver::new(GeocodeCache::new(dir.path()), keyless(&mock_server.uri()));

        let coord = resolver.resolve(&ZipCode::parse("02134").unwrap()).await.unwrap();
        assert_eq!(coord, Coordinate::rounded(42.3537, -71.1336).unwrap());
    }
}
