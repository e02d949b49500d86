//! Typed errors shared across the client.
//!
//! Every failure the controller can hit ends up as a [`WeatherError`]; the
//! display text comes from [`WeatherError::user_message`] rather than the
//! `Display` impl, which is meant for logs.

use thiserror::Error;

pub const CITY_NOT_FOUND_MESSAGE: &str = "City not found. Please check the spelling and try again.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Unable to fetch weather data. Please try again.";
pub const OFFLINE_MESSAGE: &str = "No internet connection. Please check your network.";
pub const LOCATION_FAILURE_MESSAGE: &str =
    "Unable to retrieve your location. Please enable location services.";
pub const LOCATION_UNSUPPORTED_MESSAGE: &str = "Geolocation is not supported on this device.";
pub const MISSING_API_KEY_MESSAGE: &str =
    "Please configure your OpenWeather API key (run `skycast configure`).";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("geolocation is not available")]
    Unsupported,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    /// Input rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    #[error("city not found")]
    CityNotFound,

    #[error("weather API error: {message}")]
    Api { message: String },

    #[error("network error: {message}")]
    Network { offline: bool, message: String },

    #[error("failed to decode weather API response: {0}")]
    Decode(String),

    #[error("geolocation error: {0}")]
    Geolocation(#[from] GeolocationError),
}

impl WeatherError {
    pub fn validation(message: impl Into<String>) -> Self {
        WeatherError::Validation(message.into())
    }

    /// Text suitable for the error banner.
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::Validation(message) => message.clone(),
            WeatherError::CityNotFound => CITY_NOT_FOUND_MESSAGE.to_string(),
            WeatherError::Api { message } if !message.trim().is_empty() => message.clone(),
            WeatherError::Network { offline: true, .. } => OFFLINE_MESSAGE.to_string(),
            WeatherError::Geolocation(GeolocationError::Unsupported) => {
                LOCATION_UNSUPPORTED_MESSAGE.to_string()
            }
            WeatherError::Geolocation(_) => LOCATION_FAILURE_MESSAGE.to_string(),
            WeatherError::Api { .. } | WeatherError::Network { .. } | WeatherError::Decode(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return WeatherError::Decode(err.to_string());
        }
        WeatherError::Network { offline: err.is_connect(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::Decode(err.to_string())
    }
}
