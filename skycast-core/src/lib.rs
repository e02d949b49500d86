//! Core library for the `skycast` weather client.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather HTTP client behind the [`WeatherProvider`] trait
//! - Preference persistence over a key-value string store
//! - View models and the [`Renderer`] display adapter
//! - The [`App`] controller that ties them together
//!
//! It is used by `skycast-cli`, but any front end that implements
//! [`Renderer`] can drive the same controller.

pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod render;
pub mod storage;

pub use config::{Config, GeolocationConfig};
pub use controller::{App, Outcome};
pub use error::{GeolocationError, WeatherError};
pub use location::{FixedLocation, Geolocator, IpGeolocator, NoGeolocation, geolocator_from_config};
pub use model::{Coordinates, Forecast, ForecastEntry, Query, RecentSearches, Unit, WeatherSnapshot};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
pub use render::{CurrentView, DayCard, DisplayZone, ForecastView, RecentView, Renderer};
pub use storage::{ErrorHook, FileStore, KeyValueStore, LogHook, MemoryStore, Preferences, StorageError};
