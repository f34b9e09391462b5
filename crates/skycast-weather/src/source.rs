//! Collaborator traits consumed by the synchronization layer.
//!
//! Real implementations live in [`crate::provider`], [`crate::geocode`] and
//! [`crate::location`]; tests substitute in-process fakes.

use async_trait::async_trait;

use crate::types::{Coordinate, ForecastPayload, Location, WeatherError};

/// Hourly forecast lookup for a coordinate.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastPayload, WeatherError>;
}

/// Forward and reverse geocoding.
#[async_trait]
pub trait GeocodingSource: Send + Sync {
    /// Places matching `query`. An absent result list is reported as empty.
    async fn search_by_name(&self, query: &str) -> Result<Vec<Location>, WeatherError>;

    /// Best-effort human-readable name for a coordinate.
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, WeatherError>;
}

/// Source of the device's last known position.
///
/// Implementations never fail: missing permission, missing hardware and
/// lookup errors all collapse to `None`.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn last_known_location(&self) -> Option<Coordinate>;
}
