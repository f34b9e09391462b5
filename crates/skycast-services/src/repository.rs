//! Async access to favorites and the weather cache.
//!
//! `WeatherRepository` is the seam the synchronization layer talks to.
//! `SqliteRepository` wraps [`SqliteWeatherStore`] behind a mutex, runs every
//! query on the blocking pool and republishes the favorites list after each
//! favorites mutation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use skycast_core::DatabaseError;
use skycast_weather::{CachedWeatherEntry, FavoriteLocation};
use tokio::sync::watch;

use crate::store::{SqliteWeatherStore, StoreResult};

/// Persistent favorites and weather cache.
#[async_trait]
pub trait WeatherRepository: Send + Sync {
    /// Live view of the favorites table. The receiver starts at the current list.
    fn subscribe_favorites(&self) -> watch::Receiver<Vec<FavoriteLocation>>;

    /// Insert or replace a favorite (keyed by name).
    async fn upsert_favorite(&self, favorite: &FavoriteLocation) -> StoreResult<()>;

    /// Delete a favorite by name. Deleting an absent name is not an error.
    async fn delete_favorite(&self, name: &str) -> StoreResult<bool>;

    async fn is_favorite(&self, name: &str) -> StoreResult<bool>;

    async fn cached_weather(&self, location_key: &str) -> StoreResult<Option<CachedWeatherEntry>>;

    /// Insert or replace the cached forecast for `entry.location_key`.
    async fn upsert_cached_weather(&self, entry: &CachedWeatherEntry) -> StoreResult<()>;

    async fn delete_cached_weather(&self, location_key: &str) -> StoreResult<()>;
}

/// SQLite-backed repository.
#[derive(Clone)]
pub struct SqliteRepository {
    store: Arc<Mutex<SqliteWeatherStore>>,
    favorites_tx: Arc<watch::Sender<Vec<FavoriteLocation>>>,
}

impl SqliteRepository {
    /// Wrap an open store, seeding the favorites stream from its contents.
    pub fn new(store: SqliteWeatherStore) -> StoreResult<Self> {
        let favorites = store.list_favorites()?;
        let (favorites_tx, _) = watch::channel(favorites);
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            favorites_tx: Arc::new(favorites_tx),
        })
    }

    /// Open the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::new(SqliteWeatherStore::open(path)?)
    }

    /// Ephemeral repository backed by an in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::new(SqliteWeatherStore::open_in_memory()?)
    }

    async fn with_store<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteWeatherStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store.lock()))
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("storage task failed: {}", e)))?
    }

    /// Apply a favorites mutation, then re-read the table and notify
    /// subscribers, all under the store lock. Publications therefore follow
    /// the order the writes were applied in.
    async fn mutate_favorites<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteWeatherStore) -> StoreResult<(T, bool)> + Send + 'static,
    {
        let favorites_tx = self.favorites_tx.clone();
        self.with_store(move |store| {
            let (value, changed) = op(store)?;
            if changed {
                let favorites = store.list_favorites()?;
                tracing::debug!("Favorites changed ({} entries)", favorites.len());
                favorites_tx.send_replace(favorites);
            }
            Ok(value)
        })
        .await
    }
}

#[async_trait]
impl WeatherRepository for SqliteRepository {
    fn subscribe_favorites(&self) -> watch::Receiver<Vec<FavoriteLocation>> {
        self.favorites_tx.subscribe()
    }

    async fn upsert_favorite(&self, favorite: &FavoriteLocation) -> StoreResult<()> {
        let favorite = favorite.clone();
        self.mutate_favorites(move |store| store.upsert_favorite(&favorite).map(|()| ((), true)))
            .await
    }

    async fn delete_favorite(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.mutate_favorites(move |store| {
            let deleted = store.delete_favorite(&name)?;
            Ok((deleted, deleted))
        })
        .await
    }

    async fn is_favorite(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.with_store(move |store| store.is_favorite(&name)).await
    }

    async fn cached_weather(&self, location_key: &str) -> StoreResult<Option<CachedWeatherEntry>> {
        let key = location_key.to_string();
        self.with_store(move |store| store.cached_weather(&key)).await
    }

    async fn upsert_cached_weather(&self, entry: &CachedWeatherEntry) -> StoreResult<()> {
        let entry = entry.clone();
        self.with_store(move |store| store.upsert_cached_weather(&entry))
            .await
    }

    async fn delete_cached_weather(&self, location_key: &str) -> StoreResult<()> {
        let key = location_key.to_string();
        self.with_store(move |store| store.delete_cached_weather(&key))
            .await
    }
}
