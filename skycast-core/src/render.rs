//! Pure mapping from weather data to view models, and the adapter trait that
//! puts view models on screen.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Serialize;

use crate::model::{Forecast, ForecastEntry, RecentSearches, Unit, WeatherSnapshot};

/// Glyph for an OpenWeather condition code.
pub fn weather_icon(code: u16) -> &'static str {
    match code {
        200..=299 => "⛈️",
        300..=599 => "🌧️",
        600..=699 => "❄️",
        700..=799 => "🌫️",
        800 => "☀️",
        801.. => "☁️",
        _ => "🌡️",
    }
}

/// Upper-cases the first character of every space-delimited word.
pub fn capitalize_words(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nearest integer, with halves going up (`-2.5` → `-2`).
pub fn round_temperature(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn format_temperature(value: f64, unit: Unit) -> String {
    format!("{}{}", round_temperature(value), unit.temperature_suffix())
}

/// Zone for clock times and weekday names. Each timestamp is shown with the
/// offset in effect at that instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn localize(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            DisplayZone::Local => at.with_timezone(&Local).fixed_offset(),
            DisplayZone::Fixed(offset) => at.with_timezone(offset),
        }
    }
}

fn clock_time(at: DateTime<Utc>, zone: &DisplayZone) -> String {
    zone.localize(at).format("%I:%M %p").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentView {
    pub icon: &'static str,
    pub location: String,
    pub temperature: String,
    pub condition: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind: String,
    pub pressure: String,
    pub sunrise: String,
    pub sunset: String,
}

impl CurrentView {
    pub fn build(snapshot: &WeatherSnapshot, unit: Unit, zone: &DisplayZone) -> Self {
        Self {
            icon: weather_icon(snapshot.condition_code),
            location: snapshot.location_label(),
            temperature: format_temperature(snapshot.temperature, unit),
            condition: capitalize_words(&snapshot.description),
            feels_like: format_temperature(snapshot.feels_like, unit),
            humidity: format!("{}%", snapshot.humidity_pct),
            wind: format!("{} {}", snapshot.wind_speed, unit.wind_label()),
            pressure: format!("{} hPa", snapshot.pressure_hpa),
            sunrise: clock_time(snapshot.sunrise, zone),
            sunset: clock_time(snapshot.sunset, zone),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCard {
    pub day: String,
    pub icon: &'static str,
    pub temperature: String,
    pub description: String,
}

impl DayCard {
    fn build(entry: &ForecastEntry, unit: Unit, zone: &DisplayZone) -> Self {
        Self {
            day: zone.localize(entry.time).format("%a").to_string(),
            icon: weather_icon(entry.condition_code),
            temperature: format_temperature(entry.temperature, unit),
            description: capitalize_words(&entry.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastView {
    pub title: &'static str,
    pub days: Vec<DayCard>,
}

impl ForecastView {
    pub fn build(forecast: &Forecast, unit: Unit, zone: &DisplayZone) -> Self {
        Self {
            title: "5-Day Forecast",
            days: forecast.daily().into_iter().map(|e| DayCard::build(e, unit, zone)).collect(),
        }
    }
}

/// Clickable recent-search labels; activating one re-runs that search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecentView {
    pub cities: Vec<String>,
}

impl RecentView {
    pub fn build(recent: &RecentSearches) -> Self {
        Self { cities: recent.as_slice().to_vec() }
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

/// Display adapter driven by the controller.
pub trait Renderer: Send + Sync {
    fn show_weather(&self, view: &CurrentView);
    fn show_forecast(&self, view: &ForecastView);
    fn clear_forecast(&self);
    fn show_recent(&self, view: &RecentView);
    fn show_error(&self, message: &str);
    /// Transient progress text such as "Getting your location...".
    fn show_status(&self, message: &str);
    /// Busy state: input and search control are disabled while `true`.
    fn set_loading(&self, loading: bool);
    fn highlight_unit(&self, unit: Unit);
    /// Replace the text in the city input.
    fn set_query(&self, text: &str);
}
