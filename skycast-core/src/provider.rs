use crate::{
    Config,
    error::WeatherError,
    model::{Forecast, Query, Unit, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// False when requests would go out without credentials.
    fn has_api_key(&self) -> bool;

    async fn fetch_current(&self, query: &Query, unit: Unit) -> Result<WeatherSnapshot, WeatherError>;

    /// Forecast failures never propagate; they yield `None`.
    async fn fetch_forecast(&self, city: &str, unit: Unit) -> Option<Forecast>;
}

/// Construct the OpenWeather provider from config.
///
/// A missing API key is not an error here; searches report it instead.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn WeatherProvider>, WeatherError> {
    Ok(Box::new(OpenWeatherProvider::new(config)?))
}
