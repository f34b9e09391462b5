//! Weather data sources for SkyCast
//!
//! Open-Meteo forecasts, Open-Meteo/Nominatim geocoding and current-location
//! providers, each behind a trait so the synchronization layer can be tested
//! with fakes.

pub mod geocode;
pub mod location;
pub mod provider;
pub mod source;
pub mod types;

pub use geocode::Geocoder;
pub use location::{provider_from_config, FixedLocation, IpLocation, NoLocation};
pub use provider::WeatherProvider;
pub use source::{GeocodingSource, LocationProvider, WeatherSource};
pub use types::*;
