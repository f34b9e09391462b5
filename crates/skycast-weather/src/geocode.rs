//! Geocoding: place search (Open-Meteo) and reverse lookup (Nominatim).
//! Neither API requires a key; Nominatim does require a real User-Agent.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skycast_core::{ApiConfig, NetworkError};
use std::sync::Arc;
use std::time::Duration;

use crate::source::GeocodingSource;
use crate::types::{Location, WeatherError};

const UNKNOWN_PLACE: &str = "Unknown Location";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<Location>>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Arc<Client>,
    search_url: String,
    reverse_url: String,
}

impl Geocoder {
    pub fn new(
        search_base_url: impl Into<String>,
        reverse_base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            search_url: search_base_url.into().trim_end_matches('/').to_string(),
            reverse_url: reverse_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self, WeatherError> {
        Self::new(
            &api.geocoding_url,
            &api.reverse_geocoding_url,
            &api.user_agent,
            api.request_timeout(),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GeocodingSource for Geocoder {
    async fn search_by_name(&self, query: &str) -> Result<Vec<Location>, WeatherError> {
        let url = format!("{}/v1/search", self.search_url);
        let body: SearchResponse = self
            .get_json(&url, &[("name", query.to_string())])
            .await?;

        let results = body.results.unwrap_or_default();
        tracing::debug!("Search '{}' returned {} results", query, results.len());
        Ok(results)
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, WeatherError> {
        let url = format!("{}/reverse", self.reverse_url);
        let body: NominatimResponse = self
            .get_json(
                &url,
                &[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;

        let name = body.address.map(|addr| format_place_name(&addr));
        if let Some(name) = &name {
            tracing::info!("Reverse geocoded to: {}", name);
        }
        Ok(name)
    }
}

/// Build "Place, State, Country", leaving out parts already implied by
/// an earlier part (case-insensitive containment).
fn format_place_name(addr: &NominatimAddress) -> String {
    let place = [
        &addr.city,
        &addr.town,
        &addr.village,
        &addr.county,
        &addr.state,
        &addr.country,
    ]
    .into_iter()
    .find_map(|part| part.as_deref())
    .unwrap_or(UNKNOWN_PLACE);

    let place_lower = place.to_lowercase();
    let mut extra: Vec<&str> = Vec::new();

    if let Some(state) = addr.state.as_deref() {
        if !state.trim().is_empty() && !place_lower.contains(&state.to_lowercase()) {
            extra.push(state);
        }
    }

    if let Some(country) = addr.country.as_deref() {
        let country_lower = country.to_lowercase();
        if !country.trim().is_empty()
            && !place_lower.contains(&country_lower)
            && !extra
                .iter()
                .any(|part| part.to_lowercase().contains(&country_lower))
        {
            extra.push(country);
        }
    }

    if extra.is_empty() {
        place.to_string()
    } else {
        format!("{}, {}", place, extra.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address(pairs: &[(&str, &str)]) -> NominatimAddress {
        let mut addr = NominatimAddress::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "city" => addr.city = value,
                "town" => addr.town = value,
                "village" => addr.village = value,
                "county" => addr.county = value,
                "state" => addr.state = value,
                "country" => addr.country = value,
                other => unreachable!("unknown address key {other}"),
            }
        }
        addr
    }

    fn geocoder(server: &MockServer) -> Geocoder {
        Geocoder::new(
            server.uri(),
            server.uri(),
            "skycast-test",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_format_city_state_country() {
        let addr = address(&[
            ("city", "Seattle"),
            ("state", "Washington"),
            ("country", "United States"),
        ]);
        assert_eq!(format_place_name(&addr), "Seattle, Washington, United States");
    }

    #[test]
    fn test_format_falls_back_through_place_chain() {
        let addr = address(&[("village", "Hallstatt"), ("country", "Austria")]);
        assert_eq!(format_place_name(&addr), "Hallstatt, Austria");
    }

    #[test]
    fn test_format_skips_state_contained_in_place() {
        // Place falls back to the state itself, so it must not repeat.
        let addr = address(&[("state", "Bavaria"), ("country", "Germany")]);
        assert_eq!(format_place_name(&addr), "Bavaria, Germany");
    }

    #[test]
    fn test_format_skips_country_contained_in_state() {
        let addr = address(&[
            ("town", "Esch"),
            ("state", "Canton Luxembourg"),
            ("country", "luxembourg"),
        ]);
        assert_eq!(format_place_name(&addr), "Esch, Canton Luxembourg");
    }

    #[test]
    fn test_format_ignores_blank_parts() {
        let addr = address(&[("city", "Paris"), ("state", "  "), ("country", "France")]);
        assert_eq!(format_place_name(&addr), "Paris, France");
    }

    #[test]
    fn test_format_empty_address() {
        assert_eq!(format_place_name(&NominatimAddress::default()), UNKNOWN_PLACE);
    }

    #[tokio::test]
    async fn test_search_by_name_returns_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {
                        "id": 2643743,
                        "name": "London",
                        "latitude": 51.50853,
                        "longitude": -0.12574,
                        "elevation": 25.0,
                        "country": "United Kingdom",
                        "admin1": "England"
                    },
                    {
                        "id": 6058560,
                        "name": "London",
                        "latitude": 42.98339,
                        "longitude": -81.23304,
                        "elevation": 252.0,
                        "country": "Canada",
                        "admin1": "Ontario"
                    }
                ],
                "generationtime_ms": 0.7
            })))
            .mount(&server)
            .await;

        let results = geocoder(&server).search_by_name("London").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].display_name(), "London, England");
        assert_eq!(results[1].country, "Canada");
    }

    #[tokio::test]
    async fn test_search_without_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "generationtime_ms": 0.2 })),
            )
            .mount(&server)
            .await;

        let results = geocoder(&server).search_by_name("Xyzzy").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = geocoder(&server).search_by_name("Paris").await.unwrap_err();
        assert!(matches!(
            err,
            WeatherError::Network(NetworkError::ServerError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_reverse_geocode_formats_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "47.6062"))
            .and(query_param("lon", "-122.3321"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Seattle, King County, Washington, United States",
                "address": {
                    "city": "Seattle",
                    "county": "King County",
                    "state": "Washington",
                    "country": "United States"
                }
            })))
            .mount(&server)
            .await;

        let name = geocoder(&server)
            .reverse_geocode(47.6062, -122.3321)
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Seattle, Washington, United States"));
    }

    #[tokio::test]
    async fn test_reverse_geocode_without_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let name = geocoder(&server).reverse_geocode(0.0, 0.0).await.unwrap();
        assert!(name.is_none());
    }
}
