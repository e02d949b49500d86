use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurement system used both for API queries and for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Unit] {
        &[Unit::Metric, Unit::Imperial]
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }

    pub fn wind_label(&self) -> &'static str {
        match self {
            Unit::Metric => "m/s",
            Unit::Imperial => "mph",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown unit system '{0}'. Supported: metric, imperial.")]
pub struct ParseUnitError(String);

impl FromStr for Unit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// What to ask the current-conditions endpoint for.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    City(String),
    Coords(Coordinates),
}

/// Current conditions for one place, as returned by a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    pub wind_speed: f64,
    pub pressure_hpa: u32,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub condition_code: u16,
    pub description: String,
}

impl WeatherSnapshot {
    pub fn location_label(&self) -> String {
        if self.country.is_empty() {
            self.city.clone()
        } else {
            format!("{}, {}", self.city, self.country)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    /// Wall-clock label of the 3-hour slot this entry covers.
    pub slot: NaiveDateTime,
    pub temperature: f64,
    pub condition_code: u16,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub entries: Vec<ForecastEntry>,
}

impl Forecast {
    pub const MAX_DAYS: usize = 5;

    /// One midday entry per calendar day, at most [`Forecast::MAX_DAYS`], in
    /// chronological order.
    pub fn daily(&self) -> Vec<&ForecastEntry> {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();

        let mut midday: Vec<&ForecastEntry> =
            self.entries.iter().filter(|e| e.slot.time() == noon).collect();
        midday.sort_by_key(|e| e.slot);

        let mut days: Vec<NaiveDate> = Vec::new();
        let mut picked = Vec::new();
        for entry in midday {
            if picked.len() == Self::MAX_DAYS {
                break;
            }
            let day = entry.slot.date();
            if !days.contains(&day) {
                days.push(day);
                picked.push(entry);
            }
        }
        picked
    }
}

/// Bounded, most-recent-first list of searched cities.
///
/// Cities compare case-insensitively; the casing of the latest search wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentSearches {
    cities: Vec<String>,
}

impl RecentSearches {
    pub const CAPACITY: usize = 5;

    pub fn from_vec(cities: Vec<String>) -> Self {
        let mut recent = Self::default();
        // Oldest first so the first element ends up in front.
        for city in cities.into_iter().rev() {
            recent.push(&city);
        }
        recent
    }

    pub fn push(&mut self, city: &str) {
        let city = city.trim();
        if city.is_empty() {
            return;
        }
        let key = city.to_lowercase();
        self.cities.retain(|c| c.to_lowercase() != key);
        self.cities.insert(0, city.to_string());
        self.cities.truncate(Self::CAPACITY);
    }

    pub fn as_slice(&self) -> &[String] {
        &self.cities
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cities.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, hour: u32) -> ForecastEntry {
        let slot = NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid slot");
        ForecastEntry {
            time: slot.and_utc(),
            slot,
            temperature: 20.0,
            condition_code: 800,
            description: "clear sky".into(),
        }
    }

    #[test]
    fn unit_parses_case_insensitively() {
        assert_eq!("Imperial".parse::<Unit>(), Ok(Unit::Imperial));
        assert_eq!(" metric ".parse::<Unit>(), Ok(Unit::Metric));
        for unit in Unit::all() {
            assert_eq!(unit.as_str().parse::<Unit>().as_ref(), Ok(unit));
        }
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let err = "kelvin".parse::<Unit>().unwrap_err();
        assert!(err.to_string().contains("Unknown unit system"));
    }

    #[test]
    fn unit_labels() {
        assert_eq!(Unit::Metric.temperature_suffix(), "°C");
        assert_eq!(Unit::Imperial.temperature_suffix(), "°F");
        assert_eq!(Unit::Metric.wind_label(), "m/s");
        assert_eq!(Unit::Imperial.wind_label(), "mph");
    }

    #[test]
    fn daily_picks_noon_slots_in_order() {
        let mut entries = Vec::new();
        for day in 1..=6 {
            for hour in (0..24).step_by(3) {
                entries.push(entry(day, hour));
            }
        }
        let forecast = Forecast { entries };

        let daily = forecast.daily();
        assert_eq!(daily.len(), 5);
        for (i, e) in daily.iter().enumerate() {
            assert_eq!(e.slot.time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
            assert_eq!(e.slot.date(), NaiveDate::from_ymd_opt(2024, 5, i as u32 + 1).unwrap());
        }
    }

    #[test]
    fn daily_keeps_one_entry_per_day() {
        let forecast = Forecast { entries: vec![entry(2, 12), entry(1, 12), entry(2, 12), entry(3, 9)] };

        let days: Vec<_> = forecast.daily().iter().map(|e| e.slot.date()).collect();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            ]
        );
    }

    #[test]
    fn daily_of_empty_forecast_is_empty() {
        assert!(Forecast::default().daily().is_empty());
    }

    #[test]
    fn recent_keeps_five_most_recent() {
        let mut recent = RecentSearches::default();
        for city in ["Oslo", "Rome", "Lima", "Kyiv", "Pune", "Doha", "Baku"] {
            recent.push(city);
        }
        assert_eq!(recent.as_slice(), ["Baku", "Doha", "Pune", "Kyiv", "Lima"]);
    }

    #[test]
    fn recent_moves_duplicate_to_front_ignoring_case() {
        let mut recent = RecentSearches::default();
        for city in ["Oslo", "Rome", "Lima"] {
            recent.push(city);
        }
        recent.push("OSLO");
        assert_eq!(recent.as_slice(), ["OSLO", "Lima", "Rome"]);
        assert_eq!(recent.len(), 3);
    }

    #[test]
    fn recent_ignores_blank_entries() {
        let mut recent = RecentSearches::default();
        recent.push("   ");
        assert!(recent.is_empty());
    }

    #[test]
    fn recent_from_vec_normalizes_stored_lists() {
        let stored = vec!["Paris".into(), "paris".into(), "Lyon".into()];
        let recent = RecentSearches::from_vec(stored);
        assert_eq!(recent.as_slice(), ["Paris", "Lyon"]);
    }

    #[test]
    fn location_label_skips_missing_country() {
        let snapshot = WeatherSnapshot {
            city: "Atlantis".into(),
            country: String::new(),
            temperature: 0.0,
            feels_like: 0.0,
            humidity_pct: 0,
            wind_speed: 0.0,
            pressure_hpa: 0,
            sunrise: DateTime::<Utc>::UNIX_EPOCH,
            sunset: DateTime::<Utc>::UNIX_EPOCH,
            condition_code: 0,
            description: String::new(),
        };
        assert_eq!(snapshot.location_label(), "Atlantis");
    }
}
