use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use skycast_core::{NetworkError, ReqwestErrorExt};

/// Cache key reserved for the device's own location.
pub const CURRENT_LOCATION_KEY: &str = "current_location";

/// Geographic coordinate reported by a location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A place returned by forward geocoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub admin2: Option<String>,
}

impl Location {
    /// Name shown for this place, e.g. "Springfield, Illinois".
    pub fn display_name(&self) -> String {
        match &self.admin1 {
            Some(admin1) => format!("{}, {}", self.name, admin1),
            None => self.name.clone(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A user-saved location. `name` is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteLocation {
    pub name: String,
    pub country: String,
    pub admin1: Option<String>,
    pub admin2: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl FavoriteLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Two favorites are the same entry when their names match.
    pub fn same_entry(&self, other: &FavoriteLocation) -> bool {
        self.name == other.name
    }
}

impl From<&Location> for FavoriteLocation {
    fn from(location: &Location) -> Self {
        Self {
            name: location.name.clone(),
            country: location.country.clone(),
            admin1: location.admin1.clone(),
            admin2: location.admin2.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            elevation: location.elevation,
        }
    }
}

/// Units reported alongside the hourly series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyUnits {
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "temperature_2m")]
    pub temperature: String,
    #[serde(default, rename = "relative_humidity_2m")]
    pub humidity: String,
    #[serde(default)]
    pub apparent_temperature: String,
    #[serde(default)]
    pub rain: String,
    #[serde(default, rename = "wind_speed_10m")]
    pub wind_speed: String,
}

/// Parallel hourly series, aligned by index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyData {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default, rename = "temperature_2m")]
    pub temperature: Vec<Option<f64>>,
    #[serde(default, rename = "relative_humidity_2m")]
    pub humidity: Vec<Option<i32>>,
    #[serde(default)]
    pub apparent_temperature: Vec<Option<f64>>,
    #[serde(default)]
    pub rain: Vec<Option<f64>>,
    #[serde(default, rename = "wind_speed_10m")]
    pub wind_speed: Vec<Option<f64>>,
}

/// One hour of forecast, borrowed from [`HourlyData`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyPoint<'a> {
    pub time: &'a str,
    pub temperature: Option<f64>,
    pub humidity: Option<i32>,
    pub apparent_temperature: Option<f64>,
    pub rain: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl HourlyData {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Name of the first series whose length differs from `time`, if any.
    fn misaligned_series(&self) -> Option<(&'static str, usize)> {
        let expected = self.time.len();
        [
            ("temperature_2m", self.temperature.len()),
            ("relative_humidity_2m", self.humidity.len()),
            ("apparent_temperature", self.apparent_temperature.len()),
            ("rain", self.rain.len()),
            ("wind_speed_10m", self.wind_speed.len()),
        ]
        .into_iter()
        .find(|(_, len)| *len != expected)
    }

    pub fn point(&self, index: usize) -> Option<HourlyPoint<'_>> {
        Some(HourlyPoint {
            time: self.time.get(index)?.as_str(),
            temperature: *self.temperature.get(index)?,
            humidity: *self.humidity.get(index)?,
            apparent_temperature: *self.apparent_temperature.get(index)?,
            rain: *self.rain.get(index)?,
            wind_speed: *self.wind_speed.get(index)?,
        })
    }
}

/// Hourly forecast for one coordinate, as returned by Open-Meteo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPayload {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub generationtime_ms: f64,
    #[serde(default)]
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub timezone_abbreviation: String,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub hourly_units: HourlyUnits,
    pub hourly: HourlyData,
}

impl ForecastPayload {
    /// Check that every hourly series has one entry per timestamp.
    pub fn check_aligned(&self) -> Result<(), WeatherError> {
        match self.hourly.misaligned_series() {
            Some((series, len)) => Err(WeatherError::InvalidPayload(format!(
                "{} has {} entries, expected {}",
                series,
                len,
                self.hourly.len()
            ))),
            None => Ok(()),
        }
    }

    pub fn hour_count(&self) -> usize {
        self.hourly.len()
    }
}

/// Last successful forecast for a location key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedWeatherEntry {
    pub location_key: String,
    pub payload: ForecastPayload,
    pub captured_at: DateTime<Utc>,
}

impl CachedWeatherEntry {
    /// Capture `payload` under `location_key` as of now.
    pub fn new(location_key: impl Into<String>, payload: ForecastPayload) -> Self {
        Self {
            location_key: location_key.into(),
            payload,
            captured_at: Utc::now(),
        }
    }

    /// How long ago this entry was captured.
    pub fn age(&self) -> TimeDelta {
        Utc::now() - self.captured_at
    }
}

/// Data source errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid forecast payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WeatherError::Decode(err.to_string())
        } else {
            WeatherError::Network(err.into_network_error())
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Three aligned hours of forecast data.
    pub fn forecast_json(latitude: f64, longitude: f64) -> serde_json::Value {
        serde_json::json!({
            "latitude": latitude,
            "longitude": longitude,
            "generationtime_ms": 0.05,
            "utc_offset_seconds": 3600,
            "timezone": "Europe/Paris",
            "timezone_abbreviation": "CET",
            "elevation": 42.0,
            "hourly_units": {
                "time": "iso8601",
                "temperature_2m": "°C",
                "relative_humidity_2m": "%",
                "apparent_temperature": "°C",
                "rain": "mm",
                "wind_speed_10m": "km/h"
            },
            "hourly": {
                "time": ["2026-10-19T00:00", "2026-10-19T01:00", "2026-10-19T02:00"],
                "temperature_2m": [11.2, 10.8, null],
                "relative_humidity_2m": [81, 84, 86],
                "apparent_temperature": [9.9, 9.4, 9.1],
                "rain": [0.0, 0.2, 0.0],
                "wind_speed_10m": [7.4, 8.1, 6.9]
            }
        })
    }
}
