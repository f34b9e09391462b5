//! Weather synchronization core.
//!
//! `WeatherSync` owns the published [`SyncState`] and coordinates the
//! forecast source, geocoder, location provider and repository. Every
//! public operation is an independent unit that may run concurrently with
//! the others; results are published through the state slots rather than
//! returned.

use std::sync::Arc;
use std::time::Duration;

use skycast_core::{DatabaseError, SearchConfig};
use skycast_weather::{
    CachedWeatherEntry, Coordinate, FavoriteLocation, GeocodingSource, Location,
    LocationProvider, WeatherSource, CURRENT_LOCATION_KEY,
};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::repository::WeatherRepository;
use crate::search::SearchDebouncer;
use crate::state::{SyncState, WeatherState};

pub const LOCATION_UNAVAILABLE: &str = "Location Unavailable";
pub const COULD_NOT_GET_LOCATION: &str = "Could not get location";
pub const CURRENT_LOCATION_NAME: &str = "Current Location";
pub const ERROR_LOADING_LOCATION: &str = "Error Loading Location";
pub const FAILED_TO_LOAD_WEATHER: &str = "Failed to load weather data";
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Collaborators injected into [`WeatherSync`].
#[derive(Clone)]
pub struct SyncDeps {
    pub weather: Arc<dyn WeatherSource>,
    pub geocoder: Arc<dyn GeocodingSource>,
    pub locator: Arc<dyn LocationProvider>,
    pub repository: Arc<dyn WeatherRepository>,
}

struct Inner {
    deps: SyncDeps,
    state: SyncState,
    search: SearchDebouncer,
    shutdown: CancellationToken,
}

/// Cheaply cloneable handle to the synchronization core.
#[derive(Clone)]
pub struct WeatherSync {
    inner: Arc<Inner>,
}

impl WeatherSync {
    pub fn new(deps: SyncDeps, debounce: Duration, min_query_len: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                state: SyncState::default(),
                search: SearchDebouncer::new(debounce, min_query_len),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(deps: SyncDeps, config: &SearchConfig) -> Self {
        Self::new(deps, config.debounce(), config.min_query_len)
    }

    /// Published state.
    pub fn state(&self) -> &SyncState {
        &self.inner.state
    }

    /// Follow the repository's favorites stream.
    ///
    /// Each emission, including the value present at subscription time,
    /// replaces the in-memory favorites and refreshes all of their forecasts.
    /// The task ends after [`shutdown`](Self::shutdown).
    pub fn start(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut favorites_rx = self.inner.deps.repository.subscribe_favorites();
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let favorites = favorites_rx.borrow_and_update().clone();
                tracing::debug!("Favorites stream emitted {} entries", favorites.len());
                this.inner.state.favorites.set(favorites);

                let refresher = this.clone();
                tokio::spawn(async move { refresher.refresh_all_favorites().await });

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = favorites_rx.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Favorites stream closed");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Stop the favorites subscription and any in-flight search.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.search.reset();
    }

    /// Load the forecast for the device's own position.
    pub async fn load_current_location_weather(&self) {
        let state = &self.inner.state;
        state.weather.set(WeatherState::Loading);
        state.is_current_location.set(true);

        let Some(coordinate) = self.inner.deps.locator.last_known_location().await else {
            tracing::warn!("No current location available");
            state.location_name.set(LOCATION_UNAVAILABLE.to_string());
            state
                .weather
                .set(WeatherState::Error(COULD_NOT_GET_LOCATION.to_string()));
            return;
        };

        if let Err(message) = self.load_coordinate(coordinate).await {
            state.location_name.set(ERROR_LOADING_LOCATION.to_string());
            state.weather.set(WeatherState::Error(message));
        }
    }

    async fn load_coordinate(&self, coordinate: Coordinate) -> Result<(), String> {
        let deps = &self.inner.deps;
        let state = &self.inner.state;

        let (name, forecast) = tokio::join!(
            self.place_name(coordinate),
            deps.weather
                .fetch_forecast(coordinate.latitude, coordinate.longitude)
        );

        let payload = forecast.map_err(|e| {
            tracing::error!("Failed to fetch current location weather: {}", e);
            error_message(&e)
        })?;

        state.location_name.set(name);
        state.weather.set(WeatherState::Success(payload.clone()));

        let entry = CachedWeatherEntry::new(CURRENT_LOCATION_KEY, payload);
        deps.repository
            .upsert_cached_weather(&entry)
            .await
            .map_err(|e| {
                tracing::error!("Failed to cache current location weather: {}", e);
                error_message(&e)
            })
    }

    async fn place_name(&self, coordinate: Coordinate) -> String {
        match self
            .inner
            .deps
            .geocoder
            .reverse_geocode(coordinate.latitude, coordinate.longitude)
            .await
        {
            Ok(Some(name)) => name,
            Ok(None) => CURRENT_LOCATION_NAME.to_string(),
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                CURRENT_LOCATION_NAME.to_string()
            }
        }
    }

    /// Load the forecast for a location picked by name.
    pub async fn load_weather_for_location(&self, location: &Location) {
        let state = &self.inner.state;
        state.weather.set(WeatherState::Loading);
        state.is_current_location.set(false);
        state.location_name.set(location.display_name());

        let next = match self
            .inner
            .deps
            .weather
            .fetch_forecast(location.latitude, location.longitude)
            .await
        {
            Ok(payload) => WeatherState::Success(payload),
            Err(e) => {
                tracing::error!("Failed to fetch weather for {}: {}", location.name, e);
                WeatherState::Error(error_message(&e))
            }
        };
        state.weather.set(next);
    }

    /// Persist `location` as a favorite and show its forecast.
    pub async fn add_favorite(&self, location: &Location) -> Result<(), DatabaseError> {
        let favorite = FavoriteLocation::from(location);

        self.inner
            .deps
            .repository
            .upsert_favorite(&favorite)
            .await
            .inspect_err(|e| tracing::error!("Failed to add favorite {}: {}", favorite.name, e))?;

        let appended = self.inner.state.favorites.update_if(|favorites| {
            if favorites.iter().any(|f| f.same_entry(&favorite)) {
                return false;
            }
            favorites.push(favorite.clone());
            true
        });

        if appended {
            tracing::info!("Added favorite {}", favorite.name);
            self.refresh_favorite_weather(&favorite).await;
        }
        Ok(())
    }

    /// Forget a favorite. Removing one that is not stored is a no-op.
    pub async fn remove_favorite(&self, favorite: &FavoriteLocation) -> Result<(), DatabaseError> {
        let name = favorite.name.as_str();

        let deleted = self
            .inner
            .deps
            .repository
            .delete_favorite(name)
            .await
            .inspect_err(|e| tracing::error!("Failed to remove favorite {}: {}", name, e))?;
        if deleted {
            tracing::info!("Removed favorite {}", name);
        }

        let state = &self.inner.state;
        state.favorites.update_if(|favorites| {
            let before = favorites.len();
            favorites.retain(|f| f.name != name);
            favorites.len() != before
        });
        state
            .favorites_weather
            .update_if(|weather| weather.remove(name).is_some());
        Ok(())
    }

    pub async fn is_favorite(&self, name: &str) -> Result<bool, DatabaseError> {
        self.inner.deps.repository.is_favorite(name).await
    }

    /// Refresh one favorite, falling back to its cached forecast on failure.
    pub async fn refresh_favorite_weather(&self, favorite: &FavoriteLocation) {
        let deps = &self.inner.deps;
        let state = &self.inner.state;
        let name = favorite.name.as_str();

        state.set_favorite_weather(name, WeatherState::Loading);

        let next = match deps
            .weather
            .fetch_forecast(favorite.latitude, favorite.longitude)
            .await
        {
            Ok(payload) => {
                let entry = CachedWeatherEntry::new(name, payload.clone());
                if let Err(e) = deps.repository.upsert_cached_weather(&entry).await {
                    tracing::warn!("Failed to cache weather for {}: {}", name, e);
                }
                WeatherState::Success(payload)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch weather for {}: {}", name, e);
                self.cached_favorite_weather(name).await
            }
        };

        if !state.replace_favorite_weather(name, next) {
            tracing::debug!("{} was removed during refresh, dropping result", name);
        }
    }

    async fn cached_favorite_weather(&self, name: &str) -> WeatherState {
        match self.inner.deps.repository.cached_weather(name).await {
            Ok(Some(entry)) => {
                tracing::info!(
                    "Using cached weather for {} ({} minutes old)",
                    name,
                    entry.age().num_minutes()
                );
                WeatherState::Success(entry.payload)
            }
            Ok(None) => WeatherState::Error(FAILED_TO_LOAD_WEATHER.to_string()),
            Err(e) => {
                tracing::error!("Failed to read cached weather for {}: {}", name, e);
                WeatherState::Error(error_message(&e))
            }
        }
    }

    /// Replace the in-memory favorites with the stored list, then refresh them.
    pub async fn reload_favorites(&self) {
        let favorites = self
            .inner
            .deps
            .repository
            .subscribe_favorites()
            .borrow()
            .clone();
        self.inner.state.favorites.set(favorites);
        self.refresh_all_favorites().await;
    }

    /// Refresh every in-memory favorite concurrently.
    pub async fn refresh_all_favorites(&self) {
        let favorites = self.inner.state.favorites.get();
        let mut refreshes = JoinSet::new();
        for favorite in favorites {
            let this = self.clone();
            refreshes.spawn(async move { this.refresh_favorite_weather(&favorite).await });
        }
        while let Some(result) = refreshes.join_next().await {
            if let Err(e) = result {
                tracing::error!("Favorite refresh task failed: {}", e);
            }
        }
    }

    /// Start a debounced place search, superseding any earlier one.
    ///
    /// Queries shorter than the minimum length clear the suggestions
    /// immediately and return `None`.
    pub fn search(&self, query: &str) -> Option<JoinHandle<()>> {
        let state = &self.inner.state;
        let debouncer = &self.inner.search;

        if !debouncer.accepts(query) {
            debouncer.reset();
            state.suggestions.set(Vec::new());
            state.search_loading.set(false);
            return None;
        }

        let ticket = debouncer.begin();
        debouncer.publish_if_current(&ticket, || state.search_loading.set(true));

        let this = self.clone();
        let query = query.to_string();
        Some(tokio::spawn(async move {
            let inner = &this.inner;
            if !inner.search.wait(&ticket).await {
                return;
            }

            let results = tokio::select! {
                _ = ticket.cancelled() => return,
                results = inner.deps.geocoder.search_by_name(&query) => results,
            };

            let suggestions = results.unwrap_or_else(|e| {
                tracing::warn!("Search for {:?} failed: {}", query, e);
                Vec::new()
            });

            inner.search.publish_if_current(&ticket, || {
                tracing::debug!("Search for {:?} found {} places", query, suggestions.len());
                inner.state.suggestions.set(suggestions);
                inner.state.search_loading.set(false);
            });
        }))
    }
}

fn error_message(err: &impl std::fmt::Display) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl std::fmt::Display for Blank {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "  ")
        }
    }

    #[test]
    fn test_error_message_falls_back_when_blank() {
        assert_eq!(error_message(&Blank), UNKNOWN_ERROR);
        assert_eq!(
            error_message(&DatabaseError::QueryFailed("disk full".into())),
            DatabaseError::QueryFailed("disk full".into()).to_string()
        );
    }
}
