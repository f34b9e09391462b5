//! Open-Meteo hourly forecast client.

use async_trait::async_trait;
use reqwest::Client;
use skycast_core::{ApiConfig, NetworkError};
use std::sync::Arc;
use std::time::Duration;

use crate::source::WeatherSource;
use crate::types::{ForecastPayload, WeatherError};

const HOURLY_VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,rain,wind_speed_10m";

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self, WeatherError> {
        Self::new(&api.forecast_url, &api.user_agent, api.request_timeout())
    }
}

#[async_trait]
impl WeatherSource for WeatherProvider {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastPayload, WeatherError> {
        let url = format!("{}/v1/forecast", self.base_url);
        tracing::debug!("Fetching forecast for {}, {}", latitude, longitude);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!("Forecast request returned status {}", status);
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let payload: ForecastPayload = response.json().await?;
        payload.check_aligned()?;

        tracing::info!(
            "Fetched {} forecast hours for {}, {}",
            payload.hour_count(),
            latitude,
            longitude
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::forecast_json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> WeatherProvider {
        WeatherProvider::new(server.uri(), "skycast-test", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_forecast_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "48.85"))
            .and(query_param("longitude", "2.35"))
            .and(query_param("hourly", HOURLY_VARIABLES))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_json(48.85, 2.35)))
            .mount(&server)
            .await;

        let payload = provider(&server).fetch_forecast(48.85, 2.35).await.unwrap();
        assert_eq!(payload.latitude, 48.85);
        assert_eq!(payload.hour_count(), 3);
    }

    #[tokio::test]
    async fn test_fetch_forecast_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_forecast(1.0, 2.0).await.unwrap_err();
        match err {
            WeatherError::Network(NetworkError::ServerError { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_forecast_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"latitude\": "))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_forecast(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_forecast_rejects_misaligned_series() {
        let server = MockServer::start().await;
        let mut body = forecast_json(1.0, 2.0);
        body["hourly"]["wind_speed_10m"] = serde_json::json!([]);
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_forecast(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Nothing listens on port 9 on the loopback interface.
        let provider =
            WeatherProvider::new("http://127.0.0.1:9", "skycast-test", Duration::from_secs(2))
                .unwrap();
        let err = provider.fetch_forecast(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Network(_)));
    }
}
