//! Current-location providers.
//!
//! A desktop process has no GPS fix, so the "device location" is either a
//! coordinate from configuration or an IP geolocation lookup. Any failure
//! is reported as `None`, never as an error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skycast_core::{ApiConfig, LocationConfig};
use std::sync::Arc;
use std::time::Duration;

use crate::source::LocationProvider;
use crate::types::{Coordinate, WeatherError};

/// Always reports the same coordinate.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinate);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn last_known_location(&self) -> Option<Coordinate> {
        Some(self.0)
    }
}

/// No location source available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn last_known_location(&self) -> Option<Coordinate> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct IpLocationResponse {
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Resolves the current location from the caller's public IP address.
#[derive(Debug, Clone)]
pub struct IpLocation {
    client: Arc<Client>,
    url: String,
}

impl IpLocation {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            url: url.into(),
        })
    }

    async fn lookup(&self) -> Result<Option<Coordinate>, WeatherError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let body: IpLocationResponse = response.json().await?;
        Ok(match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        })
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn last_known_location(&self) -> Option<Coordinate> {
        match self.lookup().await {
            Ok(Some(coordinate)) => {
                tracing::info!(
                    "Got location: {}, {}",
                    coordinate.latitude,
                    coordinate.longitude
                );
                Some(coordinate)
            }
            Ok(None) => {
                tracing::debug!("IP lookup returned no coordinate");
                None
            }
            Err(e) => {
                tracing::debug!("IP location lookup failed: {}", e);
                None
            }
        }
    }
}

/// Pick the location provider described by configuration.
///
/// A fixed coordinate wins over IP lookup; with neither, location is unavailable.
pub fn provider_from_config(
    location: &LocationConfig,
    api: &ApiConfig,
) -> Arc<dyn LocationProvider> {
    if let Some((lat, lon)) = location.fixed_coordinate() {
        return Arc::new(FixedLocation(Coordinate::new(lat, lon)));
    }

    if let Some(url) = &location.ip_lookup_url {
        match IpLocation::new(url.clone(), &api.user_agent, api.request_timeout()) {
            Ok(provider) => return Arc::new(provider),
            Err(e) => tracing::warn!("Failed to create IP location client: {}", e),
        }
    }

    Arc::new(NoLocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fixed_location() {
        let provider = FixedLocation(Coordinate::new(48.85, 2.35));
        assert_eq!(
            provider.last_known_location().await,
            Some(Coordinate::new(48.85, 2.35))
        );
    }

    #[tokio::test]
    async fn test_no_location() {
        assert!(NoLocation.last_known_location().await.is_none());
    }

    #[tokio::test]
    async fn test_ip_location_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "lat": 47.6062,
                "lon": -122.3321
            })))
            .mount(&server)
            .await;

        let provider = IpLocation::new(
            format!("{}/json", server.uri()),
            "skycast-test",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            provider.last_known_location().await,
            Some(Coordinate::new(47.6062, -122.3321))
        );
    }

    #[tokio::test]
    async fn test_ip_location_failure_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider =
            IpLocation::new(server.uri(), "skycast-test", Duration::from_secs(5)).unwrap();
        assert!(provider.last_known_location().await.is_none());
    }

    #[tokio::test]
    async fn test_provider_from_config_prefers_fixed() {
        let location = LocationConfig {
            latitude: Some(1.5),
            longitude: Some(2.5),
            ip_lookup_url: Some("http://127.0.0.1:9/json".to_string()),
        };
        let provider = provider_from_config(&location, &ApiConfig::default());
        assert_eq!(
            provider.last_known_location().await,
            Some(Coordinate::new(1.5, 2.5))
        );
    }

    #[tokio::test]
    async fn test_provider_from_config_without_source() {
        let provider = provider_from_config(&LocationConfig::default(), &ApiConfig::default());
        assert!(provider.last_known_location().await.is_none());
    }
}
