//! SQLite-backed storage for favorite locations and cached forecasts.
//!
//! `SqliteWeatherStore` is synchronous; async callers go through
//! [`crate::repository::SqliteRepository`], which runs it on the blocking pool.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use skycast_core::{DatabaseError, RusqliteErrorExt};
use skycast_weather::{CachedWeatherEntry, FavoriteLocation, ForecastPayload};
use std::path::Path;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, DatabaseError>;

fn db_err(e: rusqlite::Error) -> DatabaseError {
    e.into_database_error()
}

/// SQLite storage for favorites and the weather cache.
pub struct SqliteWeatherStore {
    conn: Connection,
}

impl SqliteWeatherStore {
    /// Open (or create) the store at the given path.
    ///
    /// Creates the parent directory, database file and schema if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionFailed(format!("{}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("{}: {}", path.display(), e))
        })?;
        let store = Self { conn };
        store.init_schema()?;
        tracing::debug!("Opened weather store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (for tests and ephemeral sessions).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> StoreResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS favorite_locations (
                    name TEXT PRIMARY KEY,
                    country TEXT NOT NULL,
                    admin1 TEXT,
                    admin2 TEXT,
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL,
                    elevation REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS cached_weather (
                    location_key TEXT PRIMARY KEY,
                    payload_json TEXT NOT NULL,
                    captured_at_ms INTEGER NOT NULL
                );
                "#,
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    fn row_to_favorite(row: &rusqlite::Row) -> rusqlite::Result<FavoriteLocation> {
        Ok(FavoriteLocation {
            name: row.get(0)?,
            country: row.get(1)?,
            admin1: row.get(2)?,
            admin2: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            elevation: row.get(6)?,
        })
    }

    /// All favorites in insertion order. Replacing a favorite moves it to the end.
    pub fn list_favorites(&self) -> StoreResult<Vec<FavoriteLocation>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, country, admin1, admin2, latitude, longitude, elevation
                 FROM favorite_locations
                 ORDER BY rowid",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map([], Self::row_to_favorite).map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    /// Insert a favorite, replacing any existing entry with the same name.
    pub fn upsert_favorite(&self, favorite: &FavoriteLocation) -> StoreResult<()> {
        self.conn
            .execute(
                r#"
                INSERT OR REPLACE INTO favorite_locations
                (name, country, admin1, admin2, latitude, longitude, elevation)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    favorite.name,
                    favorite.country,
                    favorite.admin1,
                    favorite.admin2,
                    favorite.latitude,
                    favorite.longitude,
                    favorite.elevation,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Delete a favorite by name. Returns whether a row was removed.
    pub fn delete_favorite(&self, name: &str) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM favorite_locations WHERE name = ?1",
                params![name],
            )
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    pub fn is_favorite(&self, name: &str) -> StoreResult<bool> {
        let exists: i64 = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM favorite_locations WHERE name = ?1 LIMIT 1)",
                params![name],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(exists != 0)
    }

    /// Cached forecast for a location key, if one was ever stored.
    pub fn cached_weather(&self, location_key: &str) -> StoreResult<Option<CachedWeatherEntry>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT payload_json, captured_at_ms FROM cached_weather WHERE location_key = ?1",
                params![location_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(payload_json, captured_at_ms)| {
            decode_entry(location_key, &payload_json, captured_at_ms)
        })
        .transpose()
    }

    /// Store a forecast, replacing any previous entry for the same key.
    pub fn upsert_cached_weather(&self, entry: &CachedWeatherEntry) -> StoreResult<()> {
        let payload_json = serde_json::to_string(&entry.payload)
            .map_err(|e| DatabaseError::QueryFailed(format!("encode payload: {}", e)))?;

        self.conn
            .execute(
                r#"
                INSERT OR REPLACE INTO cached_weather (location_key, payload_json, captured_at_ms)
                VALUES (?1, ?2, ?3)
                "#,
                params![
                    entry.location_key,
                    payload_json,
                    entry.captured_at.timestamp_millis()
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn delete_cached_weather(&self, location_key: &str) -> StoreResult<()> {
        self.conn
            .execute(
                "DELETE FROM cached_weather WHERE location_key = ?1",
                params![location_key],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

fn decode_entry(
    location_key: &str,
    payload_json: &str,
    captured_at_ms: i64,
) -> StoreResult<CachedWeatherEntry> {
    let payload: ForecastPayload = serde_json::from_str(payload_json).map_err(|e| {
        DatabaseError::Corruption(format!("cached weather for '{}': {}", location_key, e))
    })?;
    let captured_at = DateTime::<Utc>::from_timestamp_millis(captured_at_ms).ok_or_else(|| {
        DatabaseError::Corruption(format!(
            "cached weather for '{}' has invalid timestamp {}",
            location_key, captured_at_ms
        ))
    })?;

    Ok(CachedWeatherEntry {
        location_key: location_key.to_string(),
        payload,
        captured_at,
    })
}
