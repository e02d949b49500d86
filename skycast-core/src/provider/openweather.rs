use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
    config::Config,
    error::{MISSING_API_KEY_MESSAGE, WeatherError},
    model::{Forecast, ForecastEntry, Query, Unit, WeatherSnapshot},
};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    api_url: String,
    forecast_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            api_key: config.api_key().map(str::to_owned),
            api_url: config.api_url.clone(),
            forecast_url: config.forecast_url.clone(),
            http,
        })
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or_else(|| WeatherError::validation(MISSING_API_KEY_MESSAGE))
    }

    async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<String, WeatherError> {
        let res = self.http.get(url).query(params).send().await?;

        let status = res.status();
        let body = res.text().await?;

        check_status(status, &body)?;
        Ok(body)
    }

    async fn try_fetch_forecast(&self, city: &str, unit: Unit) -> Result<Forecast, WeatherError> {
        let params = [
            ("q", city.to_string()),
            ("appid", self.api_key()?.to_string()),
            ("units", unit.as_str().to_string()),
        ];
        let body = self.get(&self.forecast_url, &params).await?;

        let parsed: OwForecastResponse = serde_json::from_str(&body)?;

        let entries = parsed
            .list
            .into_iter()
            .filter_map(|e| {
                let time = unix_to_utc(e.dt)?;
                let slot = e
                    .dt_txt
                    .as_deref()
                    .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
                    .unwrap_or_else(|| time.naive_utc());
                let (condition_code, description) = first_condition(e.weather);
                Some(ForecastEntry {
                    time,
                    slot,
                    temperature: e.main.temp,
                    condition_code,
                    description,
                })
            })
            .collect();

        Ok(Forecast { entries })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwCod {
    Number(i64),
    Text(String),
}

impl OwCod {
    fn code(&self) -> Option<i64> {
        match self {
            OwCod::Number(n) => Some(*n),
            OwCod::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Fields present on both success and error bodies.
#[derive(Debug, Deserialize)]
struct OwEnvelope {
    cod: Option<OwCod>,
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u16,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    #[serde(default)]
    dt_txt: Option<String>,
    main: OwForecastMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self))]
    async fn fetch_current(&self, query: &Query, unit: Unit) -> Result<WeatherSnapshot, WeatherError> {
        let mut params = match query {
            Query::City(city) => vec![("q", city.clone())],
            Query::Coords(c) => vec![("lat", c.latitude.to_string()), ("lon", c.longitude.to_string())],
        };
        params.push(("appid", self.api_key()?.to_string()));
        params.push(("units", unit.as_str().to_string()));

        let body = self.get(&self.api_url, &params).await?;
        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;

        let sunrise = unix_to_utc(parsed.sys.sunrise)
            .ok_or_else(|| WeatherError::Decode("sunrise out of range".into()))?;
        let sunset = unix_to_utc(parsed.sys.sunset)
            .ok_or_else(|| WeatherError::Decode("sunset out of range".into()))?;
        let (condition_code, description) = first_condition(parsed.weather);

        debug!(city = %parsed.name, "current weather received");

        Ok(WeatherSnapshot {
            city: parsed.name,
            country: parsed.sys.country.unwrap_or_default(),
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
            pressure_hpa: parsed.main.pressure.round().max(0.0) as u32,
            sunrise,
            sunset,
            condition_code,
            description,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_forecast(&self, city: &str, unit: Unit) -> Option<Forecast> {
        match self.try_fetch_forecast(city, unit).await {
            Ok(forecast) => {
                debug!(entries = forecast.entries.len(), "forecast received");
                Some(forecast)
            }
            Err(error) => {
                warn!(%error, "forecast unavailable");
                None
            }
        }
    }
}

/// Maps HTTP status and the body's own `cod` onto the error taxonomy.
fn check_status(status: StatusCode, body: &str) -> Result<(), WeatherError> {
    let envelope: Option<OwEnvelope> = serde_json::from_str(body).ok();
    let cod = envelope.as_ref().and_then(|e| e.cod.as_ref()).and_then(OwCod::code);

    if status == StatusCode::NOT_FOUND || cod == Some(404) {
        return Err(WeatherError::CityNotFound);
    }

    if !status.is_success() || cod.is_some_and(|c| c != 200) {
        debug!(%status, body = %truncate_body(body), "OpenWeather request rejected");
        let message = envelope
            .and_then(|e| e.message)
            .and_then(|m| m.as_str().map(str::to_owned))
            .unwrap_or_default();
        return Err(WeatherError::Api { message });
    }

    Ok(())
}

fn first_condition(weather: Vec<OwWeather>) -> (u16, String) {
    weather
        .into_iter()
        .next()
        .map(|w| (w.id, w.description))
        .unwrap_or_else(|| (0, "unknown".to_string()))
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
