//! Weather synchronization services for SkyCast
//!
//! SQLite persistence for favorites and cached forecasts, plus the
//! [`WeatherSync`] core that publishes observable weather state.

pub mod repository;
pub mod search;
pub mod state;
pub mod store;
pub mod sync;

pub use repository::{SqliteRepository, WeatherRepository};
pub use search::{SearchDebouncer, SearchTicket};
pub use state::{StateSlot, SyncState, WeatherState};
pub use store::{SqliteWeatherStore, StoreResult};
pub use sync::{SyncDeps, WeatherSync};
