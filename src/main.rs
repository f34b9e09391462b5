mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skycast_core::{AppError, Config};
use skycast_services::{SqliteRepository, SyncDeps, WeatherState, WeatherSync};
use skycast_weather::{provider_from_config, FavoriteLocation, Geocoder, Location, WeatherProvider};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    skycast_core::init()?;
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<AppError>() {
            Some(app_error) => eprintln!("{}", app_error.user_message()),
            None => eprintln!("{:#}", e),
        }
        tracing::debug!("Command failed: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let sync = build_sync(&config)?;
    tracing::info!("SkyCast started");

    match cli.command {
        Commands::Current { hours } => {
            sync.load_current_location_weather().await;
            print_weather(&sync.state().location_name.get(), &sync.state().weather.get(), hours);
        }
        Commands::Show { query, hours } => {
            let place = first_match(&sync, &query).await?;
            sync.load_weather_for_location(&place).await;
            print_weather(&sync.state().location_name.get(), &sync.state().weather.get(), hours);
        }
        Commands::Search { query } => {
            let places = search(&sync, &query).await?;
            if places.is_empty() {
                println!("No places match {:?}", query);
            }
            for place in places {
                println!(
                    "{}  ({:.4}, {:.4})  {}",
                    place.display_name(),
                    place.latitude,
                    place.longitude,
                    place.country
                );
            }
        }
        Commands::Add { query } => {
            let place = first_match(&sync, &query).await?;
            sync.add_favorite(&place).await.map_err(AppError::from)?;
            println!("Saved {}", place.display_name());
        }
        Commands::Remove { name } => {
            if !sync.is_favorite(&name).await.map_err(AppError::from)? {
                println!("{} is not a favorite", name);
                return Ok(());
            }
            let favorite = stored_favorite(&name);
            sync.remove_favorite(&favorite).await.map_err(AppError::from)?;
            println!("Removed {}", name);
        }
        Commands::Favorites => {
            sync.reload_favorites().await;
            let favorites = sync.state().favorites.get();
            if favorites.is_empty() {
                println!("No favorites yet. Add one with `skycast add <place>`.");
            }
            for favorite in favorites {
                let state = sync.state().favorite_weather(&favorite.name).unwrap_or_default();
                print_weather(&favorite.name, &state, 1);
            }
        }
    }

    sync.shutdown();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let loaded = match &cli.config {
        Some(path) => Config::load_validated_from(path),
        None => Config::load_validated(),
    };
    let (config, _warnings) = loaded.map_err(AppError::from)?;
    Ok(config)
}

fn build_sync(config: &Config) -> Result<WeatherSync> {
    let repository = SqliteRepository::open(&config.storage.database_path)
        .map_err(AppError::from)
        .context("Failed to open weather database")?;
    let weather = WeatherProvider::from_config(&config.api)?;
    let geocoder = Geocoder::from_config(&config.api)?;
    let locator = provider_from_config(&config.location, &config.api);

    let deps = SyncDeps {
        weather: Arc::new(weather),
        geocoder: Arc::new(geocoder),
        locator,
        repository: Arc::new(repository),
    };
    Ok(WeatherSync::from_config(deps, &config.search))
}

async fn search(sync: &WeatherSync, query: &str) -> Result<Vec<Location>> {
    let handle = sync
        .search(query)
        .with_context(|| format!("Search needs a longer query than {:?}", query))?;
    handle.await.context("Search task failed")?;
    Ok(sync.state().suggestions.get())
}

async fn first_match(sync: &WeatherSync, query: &str) -> Result<Location> {
    search(sync, query)
        .await?
        .into_iter()
        .next()
        .with_context(|| format!("No places match {:?}", query))
}

/// Favorites are removed by name; the other fields are not consulted.
fn stored_favorite(name: &str) -> FavoriteLocation {
    FavoriteLocation {
        name: name.to_string(),
        country: String::new(),
        admin1: None,
        admin2: None,
        latitude: 0.0,
        longitude: 0.0,
        elevation: 0.0,
    }
}

fn print_weather(name: &str, state: &WeatherState, hours: usize) {
    match state {
        WeatherState::Success(payload) => {
            println!("{} ({})", name, payload.timezone);
            let units = &payload.hourly_units;
            for point in (0..hours).map_while(|i| payload.hourly.point(i)) {
                println!(
                    "  {}  {}{}  feels {}{}  humidity {}{}  rain {}{}  wind {}{}",
                    point.time,
                    reading(point.temperature),
                    units.temperature,
                    reading(point.apparent_temperature),
                    units.apparent_temperature,
                    point.humidity.map_or_else(|| "-".to_string(), |h| h.to_string()),
                    units.humidity,
                    reading(point.rain),
                    units.rain,
                    reading(point.wind_speed),
                    units.wind_speed,
                );
            }
        }
        WeatherState::Error(message) => println!("{}: {}", name, message),
        WeatherState::Loading => println!("{}: loading", name),
        WeatherState::Idle => println!("{}: no data", name),
    }
}

fn reading(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}
