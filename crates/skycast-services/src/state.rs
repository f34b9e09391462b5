//! Published state: one watch channel per slot.
//!
//! Every slot offers a snapshot (`get`), change notification (`subscribe`)
//! and an atomic read-modify-publish (`update`). Concurrent flows never
//! hold a copy across an await and write it back.

use std::collections::HashMap;

use skycast_weather::{FavoriteLocation, ForecastPayload, Location};
use tokio::sync::watch;

/// Load state of one forecast view.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum WeatherState {
    #[default]
    Idle,
    Loading,
    Success(ForecastPayload),
    Error(String),
}

impl WeatherState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn payload(&self) -> Option<&ForecastPayload> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// A single observable value.
#[derive(Debug)]
pub struct StateSlot<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateSlot<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Current snapshot.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Receiver positioned at the current value; `changed()` fires on the next write.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Replace the value and notify observers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate the latest value in place and notify observers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Like [`update`](Self::update), but observers are only notified when
    /// `f` returns `true`. Returns what `f` returned.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Read the latest value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.tx.borrow())
    }
}

/// Everything the synchronization layer publishes.
#[derive(Debug)]
pub struct SyncState {
    /// Forecast for the location currently on screen
    pub weather: StateSlot<WeatherState>,
    /// Human-readable name of that location
    pub location_name: StateSlot<String>,
    /// Whether the on-screen location is the device's own
    pub is_current_location: StateSlot<bool>,
    pub favorites: StateSlot<Vec<FavoriteLocation>>,
    /// Forecast state per favorite, keyed by favorite name
    pub favorites_weather: StateSlot<HashMap<String, WeatherState>>,
    pub suggestions: StateSlot<Vec<Location>>,
    pub search_loading: StateSlot<bool>,
}

impl SyncState {
    pub fn favorite_weather(&self, name: &str) -> Option<WeatherState> {
        self.favorites_weather.with(|map| map.get(name).cloned())
    }

    pub(crate) fn set_favorite_weather(&self, name: &str, state: WeatherState) {
        self.favorites_weather.update(|map| {
            map.insert(name.to_string(), state);
        });
    }

    /// Overwrite an existing entry only. Returns `false`, publishing
    /// nothing, if `name` has no entry (e.g. it was removed meanwhile).
    pub(crate) fn replace_favorite_weather(&self, name: &str, state: WeatherState) -> bool {
        self.favorites_weather.update_if(|map| match map.get_mut(name) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        })
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            weather: StateSlot::new(WeatherState::Idle),
            location_name: StateSlot::new(String::new()),
            is_current_location: StateSlot::new(true),
            favorites: StateSlot::new(Vec::new()),
            favorites_weather: StateSlot::new(HashMap::new()),
            suggestions: StateSlot::new(Vec::new()),
            search_loading: StateSlot::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_without_subscribers_still_updates() {
        let slot = StateSlot::new(1);
        slot.set(2);
        slot.update(|v| *v += 1);
        assert_eq!(slot.get(), 3);
    }

    #[tokio::test]
    async fn test_subscriber_sees_latest_value() {
        let slot = StateSlot::new(String::from("a"));
        let mut rx = slot.subscribe();

        slot.set("b".to_string());
        slot.set("c".to_string());

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), "c");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_update_if_skips_notification_when_untouched() {
        let slot = StateSlot::new(vec![1, 2]);
        let mut rx = slot.subscribe();

        assert!(!slot.update_if(|v| {
            let before = v.len();
            v.retain(|x| *x != 9);
            v.len() != before
        }));
        assert!(!rx.has_changed().unwrap());

        assert!(slot.update_if(|v| {
            v.push(3);
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 2, 3]);
    }

    #[test]
    fn test_favorite_weather_updates_do_not_clobber_each_other() {
        let state = SyncState::default();
        state.set_favorite_weather("Paris", WeatherState::Loading);
        state.set_favorite_weather("Berlin", WeatherState::Error("x".into()));
        state.set_favorite_weather("Paris", WeatherState::Idle);

        assert_eq!(state.favorite_weather("Paris"), Some(WeatherState::Idle));
        assert_eq!(
            state.favorite_weather("Berlin").unwrap().error_message(),
            Some("x")
        );
        assert_eq!(state.favorite_weather("Rome"), None);
    }

    #[test]
    fn test_replace_favorite_weather_ignores_missing_entry() {
        let state = SyncState::default();
        let rx = state.favorites_weather.subscribe();

        assert!(!state.replace_favorite_weather("Paris", WeatherState::Idle));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(state.favorite_weather("Paris"), None);

        state.set_favorite_weather("Paris", WeatherState::Loading);
        assert!(state.replace_favorite_weather("Paris", WeatherState::Idle));
        assert_eq!(state.favorite_weather("Paris"), Some(WeatherState::Idle));
    }

    #[test]
    fn test_defaults() {
        let state = SyncState::default();
        assert_eq!(state.weather.get(), WeatherState::Idle);
        assert!(state.is_current_location.get());
        assert!(!state.search_loading.get());
        assert!(state.favorites.get().is_empty());
    }
}
