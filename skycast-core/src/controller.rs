//! Application controller: validates input, sequences fetch → render, owns
//! the session state.
//!
//! Every fetch pipeline takes a sequence token when it starts. A pipeline
//! whose token is no longer the latest when its response arrives drops the
//! response without touching the display or the session, so a slow request
//! can never overwrite the result of a newer one. Changing the unit while a
//! fetch is running supersedes it and repeats the same query in the new unit.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::{GeolocationError, MISSING_API_KEY_MESSAGE, WeatherError},
    location::Geolocator,
    model::{Query, RecentSearches, Unit},
    provider::WeatherProvider,
    render::{CurrentView, DisplayZone, ForecastView, RecentView, Renderer},
    storage::Preferences,
};

const EMPTY_CITY: &str = "Please enter a city name";
const LOCATING: &str = "Getting your location...";

/// In-memory UI selection.
#[derive(Debug, Clone, Default)]
struct Session {
    current_city: Option<String>,
    unit: Unit,
    recent: RecentSearches,
}

/// Result of one controller operation. Errors have already been displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Weather was rendered; `forecast` tells whether the forecast was too.
    Displayed { forecast: bool },
    Failed(WeatherError),
    /// A newer operation started before this one finished.
    Superseded,
    /// Nothing needed to happen.
    Unchanged,
}

/// Where the city label for a successful fetch comes from.
#[derive(Debug, Clone)]
enum Origin {
    Typed(String),
    Located,
}

/// The fetch currently holding the latest token.
#[derive(Debug, Clone)]
struct InFlight {
    token: u64,
    query: Query,
    origin: Origin,
    record: bool,
}

pub struct App {
    provider: Box<dyn WeatherProvider>,
    geolocator: Box<dyn Geolocator>,
    preferences: Preferences,
    renderer: Box<dyn Renderer>,
    zone: DisplayZone,
    session: Mutex<Session>,
    in_flight: Mutex<Option<InFlight>>,
    latest_request: AtomicU64,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("provider", &self.provider)
            .field("session", &*self.session.lock())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Restore the session from preferences. `default_unit` applies when no
    /// unit preference has been stored yet.
    pub fn new(
        provider: Box<dyn WeatherProvider>,
        geolocator: Box<dyn Geolocator>,
        preferences: Preferences,
        renderer: Box<dyn Renderer>,
        default_unit: Unit,
        zone: DisplayZone,
    ) -> Self {
        let session = Session {
            current_city: None,
            unit: preferences.load_unit().unwrap_or(default_unit),
            recent: preferences.load_recent(),
        };
        debug!(unit = %session.unit, recent = session.recent.len(), "session restored");

        Self {
            provider,
            geolocator,
            preferences,
            renderer,
            zone,
            session: Mutex::new(session),
            in_flight: Mutex::new(None),
            latest_request: AtomicU64::new(0),
        }
    }

    /// Paint the restored state.
    pub fn start(&self) {
        let (unit, recent) = {
            let session = self.session.lock();
            (session.unit, RecentView::build(&session.recent))
        };
        self.renderer.highlight_unit(unit);
        self.renderer.show_recent(&recent);
    }

    pub fn current_city(&self) -> Option<String> {
        self.session.lock().current_city.clone()
    }

    pub fn unit(&self) -> Unit {
        self.session.lock().unit
    }

    pub fn recent(&self) -> RecentSearches {
        self.session.lock().recent.clone()
    }

    pub async fn search(&self, city: &str) -> Outcome {
        let city = city.trim();
        if city.is_empty() {
            return self.reject(WeatherError::validation(EMPTY_CITY));
        }
        if let Err(e) = self.check_api_key() {
            return self.reject(e);
        }

        let token = self.begin();
        self.renderer.set_loading(true);
        let outcome = self
            .load(token, Query::City(city.to_string()), Origin::Typed(city.to_string()), true)
            .await;
        self.finish(token);
        outcome
    }

    /// Same as typing `city` into the input and searching.
    pub async fn search_recent(&self, city: &str) -> Outcome {
        self.renderer.set_query(city);
        self.search(city).await
    }

    pub async fn search_by_location(&self) -> Outcome {
        if !self.geolocator.is_available() {
            return self.reject(GeolocationError::Unsupported.into());
        }
        if let Err(e) = self.check_api_key() {
            return self.reject(e);
        }

        let token = self.begin();
        self.renderer.set_loading(true);
        self.renderer.show_status(LOCATING);

        let outcome = match self.geolocator.current_position().await {
            Ok(coords) => {
                debug!(latitude = coords.latitude, longitude = coords.longitude, "position acquired");
                self.load(token, Query::Coords(coords), Origin::Located, true).await
            }
            Err(e) if self.is_latest(token) => {
                warn!(error = %e, "geolocation failed");
                self.fail(e.into())
            }
            Err(_) => Outcome::Superseded,
        };
        self.finish(token);
        outcome
    }

    /// Switch unit system. A running fetch is repeated in the new unit;
    /// otherwise the current city, if any, is refreshed.
    pub async fn set_unit(&self, unit: Unit) -> Outcome {
        let current_city = {
            let mut session = self.session.lock();
            if session.unit == unit {
                return Outcome::Unchanged;
            }
            session.unit = unit;
            session.current_city.clone()
        };
        info!(%unit, "unit changed");
        self.renderer.highlight_unit(unit);

        let running = self.in_flight.lock().clone();
        let refresh = match (running, current_city) {
            (Some(running), _) => Some((running.query, running.origin, running.record)),
            (None, Some(city)) => Some((Query::City(city.clone()), Origin::Typed(city), false)),
            (None, None) => None,
        };

        let outcome = match refresh {
            Some((query, origin, record)) => {
                let token = self.begin();
                self.renderer.set_loading(true);
                let outcome = self.load(token, query, origin, record).await;
                self.finish(token);
                outcome
            }
            None => Outcome::Unchanged,
        };

        self.preferences.save_unit(unit);
        outcome
    }

    fn check_api_key(&self) -> Result<(), WeatherError> {
        if self.provider.has_api_key() {
            Ok(())
        } else {
            Err(WeatherError::validation(MISSING_API_KEY_MESSAGE))
        }
    }

    fn begin(&self) -> u64 {
        self.latest_request.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, token: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) == token
    }

    fn finish(&self, token: u64) {
        {
            let mut in_flight = self.in_flight.lock();
            if in_flight.as_ref().is_some_and(|f| f.token == token) {
                *in_flight = None;
            }
        }
        if self.is_latest(token) {
            self.renderer.set_loading(false);
        }
    }

    /// Failure before any request was issued.
    fn reject(&self, error: WeatherError) -> Outcome {
        debug!(%error, "request rejected");
        self.renderer.show_error(&error.user_message());
        Outcome::Failed(error)
    }

    fn fail(&self, error: WeatherError) -> Outcome {
        warn!(%error, "weather fetch failed");
        self.renderer.show_error(&error.user_message());
        self.renderer.clear_forecast();
        Outcome::Failed(error)
    }

    /// Fetch current weather, render it, then fetch and render the forecast.
    async fn load(&self, token: u64, query: Query, origin: Origin, record: bool) -> Outcome {
        let unit = self.unit();
        if self.is_latest(token) {
            *self.in_flight.lock() = Some(InFlight {
                token,
                query: query.clone(),
                origin: origin.clone(),
                record,
            });
        }

        let snapshot = match self.provider.fetch_current(&query, unit).await {
            Ok(snapshot) => snapshot,
            Err(_) if !self.is_latest(token) => return Outcome::Superseded,
            Err(e) => return self.fail(e),
        };
        if !self.is_latest(token) {
            debug!(token, "discarding stale weather response");
            return Outcome::Superseded;
        }

        let city = match origin {
            Origin::Typed(city) => city,
            Origin::Located => {
                self.renderer.set_query(&snapshot.city);
                snapshot.city.clone()
            }
        };

        let recent = {
            let mut session = self.session.lock();
            session.current_city = Some(city.clone());
            if record {
                session.recent.push(&city);
                Some(session.recent.clone())
            } else {
                None
            }
        };
        if let Some(recent) = recent {
            self.preferences.save_recent(&recent);
            self.renderer.show_recent(&RecentView::build(&recent));
        }

        self.renderer.show_weather(&CurrentView::build(&snapshot, unit, &self.zone));

        let forecast = self.provider.fetch_forecast(&city, unit).await;
        if !self.is_latest(token) {
            debug!(token, "discarding stale forecast response");
            return Outcome::Superseded;
        }

        match forecast {
            Some(forecast) => {
                self.renderer.show_forecast(&ForecastView::build(&forecast, unit, &self.zone));
                Outcome::Displayed { forecast: true }
            }
            None => {
                self.renderer.clear_forecast();
                Outcome::Displayed { forecast: false }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{CITY_NOT_FOUND_MESSAGE, OFFLINE_MESSAGE},
        model::{Coordinates, Forecast, ForecastEntry, WeatherSnapshot},
        storage::{
            MemoryStore, RECENT_SEARCHES_KEY, UNIT_PREFERENCE_KEY, KeyValueStore,
            tests::{BrokenStore, RecordingHook},
        },
    };
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, NaiveDate};
    use std::sync::{Arc, atomic::AtomicBool};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Current(Query, Unit),
        Forecast(String, Unit),
    }

    #[derive(Debug, Clone)]
    struct FakeProvider {
        has_key: bool,
        forecast_available: bool,
        offline: Arc<AtomicBool>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                has_key: true,
                forecast_available: true,
                offline: Arc::default(),
                calls: Arc::default(),
            }
        }
    }

    fn snapshot(city: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            city: city.to_string(),
            country: "FR".into(),
            temperature: 14.6,
            feels_like: 13.2,
            humidity_pct: 70,
            wind_speed: 4.1,
            pressure_hpa: 1015,
            sunrise: DateTime::from_timestamp(1_717_300_000, 0).unwrap(),
            sunset: DateTime::from_timestamp(1_717_357_800, 0).unwrap(),
            condition_code: 500,
            description: "light rain".into(),
        }
    }

    fn forecast() -> Forecast {
        let mut entries = Vec::new();
        for day in 1..=6 {
            for hour in [9, 12, 15] {
                let slot = NaiveDate::from_ymd_opt(2024, 6, day)
                    .unwrap()
                    .and_hms_opt(hour, 0, 0)
                    .unwrap();
                entries.push(ForecastEntry {
                    time: slot.and_utc(),
                    slot,
                    temperature: 20.0,
                    condition_code: 800,
                    description: "clear sky".into(),
                });
            }
        }
        Forecast { entries }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        fn has_api_key(&self) -> bool {
            self.has_key
        }

        async fn fetch_current(
            &self,
            query: &Query,
            unit: Unit,
        ) -> Result<WeatherSnapshot, WeatherError> {
            self.calls.lock().push(Call::Current(query.clone(), unit));
            if self.offline.load(Ordering::SeqCst) {
                return Err(WeatherError::Network {
                    offline: true,
                    message: "connection refused".into(),
                });
            }
            match query {
                Query::City(city) if city.eq_ignore_ascii_case("zzqx1") => {
                    Err(WeatherError::CityNotFound)
                }
                Query::City(city) => Ok(snapshot(city)),
                Query::Coords(_) => Ok(snapshot("Lyon")),
            }
        }

        async fn fetch_forecast(&self, city: &str, unit: Unit) -> Option<Forecast> {
            self.calls.lock().push(Call::Forecast(city.to_string(), unit));
            self.forecast_available.then(forecast)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Weather(CurrentView),
        Forecast(ForecastView),
        ClearForecast,
        Recent(Vec<String>),
        Error(String),
        Status(String),
        Loading(bool),
        Unit(Unit),
        Query(String),
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingRenderer {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl RecordingRenderer {
        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }
    }

    impl Renderer for RecordingRenderer {
        fn show_weather(&self, view: &CurrentView) {
            self.events.lock().push(Event::Weather(view.clone()));
        }
        fn show_forecast(&self, view: &ForecastView) {
            self.events.lock().push(Event::Forecast(view.clone()));
        }
        fn clear_forecast(&self) {
            self.events.lock().push(Event::ClearForecast);
        }
        fn show_recent(&self, view: &RecentView) {
            self.events.lock().push(Event::Recent(view.cities.clone()));
        }
        fn show_error(&self, message: &str) {
            self.events.lock().push(Event::Error(message.to_string()));
        }
        fn show_status(&self, message: &str) {
            self.events.lock().push(Event::Status(message.to_string()));
        }
        fn set_loading(&self, loading: bool) {
            self.events.lock().push(Event::Loading(loading));
        }
        fn highlight_unit(&self, unit: Unit) {
            self.events.lock().push(Event::Unit(unit));
        }
        fn set_query(&self, text: &str) {
            self.events.lock().push(Event::Query(text.to_string()));
        }
    }

    #[derive(Debug)]
    enum FakeGeo {
        Missing,
        Denied,
        At(Coordinates),
    }

    #[async_trait]
    impl Geolocator for FakeGeo {
        fn is_available(&self) -> bool {
            !matches!(self, FakeGeo::Missing)
        }

        async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
            match self {
                FakeGeo::Missing => Err(GeolocationError::Unsupported),
                FakeGeo::Denied => Err(GeolocationError::PermissionDenied),
                FakeGeo::At(c) => Ok(*c),
            }
        }
    }

    struct Harness {
        app: App,
        calls: Arc<Mutex<Vec<Call>>>,
        renderer: RecordingRenderer,
        store: MemoryStore,
    }

    impl Harness {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    fn harness_with(provider: FakeProvider, geo: FakeGeo, store: MemoryStore) -> Harness {
        let calls = provider.calls.clone();
        let renderer = RecordingRenderer::default();
        let app = App::new(
            Box::new(provider),
            Box::new(geo),
            Preferences::new(store.clone()),
            Box::new(renderer.clone()),
            Unit::Metric,
            DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap()),
        );
        Harness { app, calls, renderer, store }
    }

    fn harness() -> Harness {
        harness_with(FakeProvider::new(), FakeGeo::Missing, MemoryStore::new())
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_requests() {
        let h = harness();

        for input in ["", "   ", "\t"] {
            let outcome = h.app.search(input).await;
            assert!(matches!(outcome, Outcome::Failed(WeatherError::Validation(_))));
        }

        assert!(h.calls().is_empty());
        assert_eq!(h.renderer.events().last(), Some(&Event::Error(EMPTY_CITY.to_string())));
        assert!(!h.renderer.events().contains(&Event::Loading(true)));
    }

    #[tokio::test]
    async fn missing_api_key_is_rejected_without_requests() {
        let provider = FakeProvider { has_key: false, ..FakeProvider::new() };
        let h = harness_with(provider, FakeGeo::Missing, MemoryStore::new());

        let outcome = h.app.search("Paris").await;

        assert!(matches!(outcome, Outcome::Failed(WeatherError::Validation(_))));
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_search_renders_weather_then_forecast() {
        let h = harness();

        let outcome = h.app.search("  Paris ").await;

        assert_eq!(outcome, Outcome::Displayed { forecast: true });
        assert_eq!(
            h.calls(),
            vec![
                Call::Current(Query::City("Paris".into()), Unit::Metric),
                Call::Forecast("Paris".into(), Unit::Metric),
            ]
        );
        assert_eq!(h.app.current_city().as_deref(), Some("Paris"));

        let events = h.renderer.events();
        assert_eq!(events.first(), Some(&Event::Loading(true)));
        assert_eq!(events.last(), Some(&Event::Loading(false)));

        let weather = events.iter().position(|e| matches!(e, Event::Weather(_))).unwrap();
        let forecast = events.iter().position(|e| matches!(e, Event::Forecast(_))).unwrap();
        assert!(weather < forecast);

        let Event::Weather(view) = &events[weather] else { unreachable!() };
        assert_eq!(view.temperature, "15°C");
        assert_eq!(view.wind, "4.1 m/s");

        let Event::Forecast(view) = &events[forecast] else { unreachable!() };
        assert_eq!(view.days.len(), 5);
    }

    #[tokio::test]
    async fn unknown_city_shows_not_found_and_no_forecast() {
        let h = harness();

        let outcome = h.app.search("Zzqx1").await;

        assert_eq!(outcome, Outcome::Failed(WeatherError::CityNotFound));
        assert_eq!(h.calls().len(), 1);

        let events = h.renderer.events();
        assert!(events.contains(&Event::Error(CITY_NOT_FOUND_MESSAGE.to_string())));
        assert!(!events.iter().any(|e| matches!(e, Event::Forecast(_))));
        assert_eq!(events.last(), Some(&Event::Loading(false)));
        assert!(h.app.recent().is_empty());
        assert_eq!(h.app.current_city(), None);
    }

    #[tokio::test]
    async fn forecast_failure_is_not_surfaced() {
        let provider = FakeProvider { forecast_available: false, ..FakeProvider::new() };
        let h = harness_with(provider, FakeGeo::Missing, MemoryStore::new());

        let outcome = h.app.search("Oslo").await;

        assert_eq!(outcome, Outcome::Displayed { forecast: false });
        let events = h.renderer.events();
        assert!(!events.iter().any(|e| matches!(e, Event::Error(_))));
        assert!(events.contains(&Event::ClearForecast));
    }

    #[tokio::test]
    async fn recent_list_keeps_five_distinct_most_recent_first() {
        let h = harness();

        for city in ["Oslo", "Rome", "Lima", "Kyiv", "Pune", "Doha", "ROME"] {
            h.app.search(city).await;
        }

        let expected = ["ROME", "Doha", "Pune", "Kyiv", "Lima"];
        assert_eq!(h.app.recent().as_slice(), expected);
        assert_eq!(
            h.store.get(RECENT_SEARCHES_KEY).unwrap().as_deref(),
            Some(r#"["ROME","Doha","Pune","Kyiv","Lima"]"#)
        );

        let last_recent = h
            .renderer
            .events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Event::Recent(cities) => Some(cities),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_recent, expected);
    }

    #[tokio::test]
    async fn re_searching_moves_city_to_front() {
        let h = harness();
        for city in ["Oslo", "Rome", "Lima"] {
            h.app.search(city).await;
        }

        h.app.search_recent("oslo").await;

        assert_eq!(h.app.recent().as_slice(), ["oslo", "Lima", "Rome"]);
        assert!(h.renderer.events().contains(&Event::Query("oslo".into())));
    }

    #[tokio::test]
    async fn unit_toggle_without_city_only_persists() {
        let h = harness();

        let outcome = h.app.set_unit(Unit::Imperial).await;

        assert_eq!(outcome, Outcome::Unchanged);
        assert!(h.calls().is_empty());
        assert_eq!(h.app.unit(), Unit::Imperial);
        assert_eq!(h.store.get(UNIT_PREFERENCE_KEY).unwrap().as_deref(), Some("imperial"));
        assert_eq!(h.renderer.events(), vec![Event::Unit(Unit::Imperial)]);
    }

    #[tokio::test]
    async fn unit_toggle_with_city_refetches_once() {
        let h = harness();
        h.app.search("Paris").await;
        let before = h.calls().len();

        let outcome = h.app.set_unit(Unit::Imperial).await;

        assert_eq!(outcome, Outcome::Displayed { forecast: true });
        assert_eq!(
            h.calls()[before..],
            [
                Call::Current(Query::City("Paris".into()), Unit::Imperial),
                Call::Forecast("Paris".into(), Unit::Imperial),
            ]
        );
        assert_eq!(h.app.recent().len(), 1);
        assert_eq!(h.store.get(UNIT_PREFERENCE_KEY).unwrap().as_deref(), Some("imperial"));

        let Some(Event::Weather(view)) =
            h.renderer.events().into_iter().rev().find(|e| matches!(e, Event::Weather(_)))
        else {
            panic!("weather should be rendered");
        };
        assert_eq!(view.temperature, "15°F");
        assert_eq!(view.wind, "4.1 mph");
    }

    #[tokio::test]
    async fn unit_is_saved_even_when_refresh_fails() {
        let provider = FakeProvider::new();
        let offline = provider.offline.clone();
        let h = harness_with(provider, FakeGeo::Missing, MemoryStore::new());
        h.app.search("Paris").await;
        offline.store(true, Ordering::SeqCst);

        let outcome = h.app.set_unit(Unit::Imperial).await;

        assert!(matches!(outcome, Outcome::Failed(WeatherError::Network { offline: true, .. })));
        assert_eq!(h.app.unit(), Unit::Imperial);
        assert_eq!(h.store.get(UNIT_PREFERENCE_KEY).unwrap().as_deref(), Some("imperial"));

        let events = h.renderer.events();
        assert!(events.contains(&Event::Error(OFFLINE_MESSAGE.to_string())));
        assert_eq!(events.last(), Some(&Event::Loading(false)));
    }

    #[tokio::test]
    async fn selecting_current_unit_is_a_no_op() {
        let h = harness();

        assert_eq!(h.app.set_unit(Unit::Metric).await, Outcome::Unchanged);
        assert!(h.renderer.events().is_empty());
        assert_eq!(h.store.get(UNIT_PREFERENCE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn location_search_uses_coordinates_and_resolved_name() {
        let coords = Coordinates { latitude: 45.76, longitude: 4.84 };
        let h = harness_with(FakeProvider::new(), FakeGeo::At(coords), MemoryStore::new());

        let outcome = h.app.search_by_location().await;

        assert_eq!(outcome, Outcome::Displayed { forecast: true });
        assert_eq!(
            h.calls(),
            vec![
                Call::Current(Query::Coords(coords), Unit::Metric),
                Call::Forecast("Lyon".into(), Unit::Metric),
            ]
        );
        assert_eq!(h.app.current_city().as_deref(), Some("Lyon"));
        assert_eq!(h.app.recent().as_slice(), ["Lyon"]);

        let events = h.renderer.events();
        assert!(events.contains(&Event::Status(LOCATING.to_string())));
        assert!(events.contains(&Event::Query("Lyon".into())));
    }

    #[tokio::test]
    async fn location_weather_failure_shows_error() {
        let coords = Coordinates { latitude: 45.76, longitude: 4.84 };
        let provider = FakeProvider::new();
        provider.offline.store(true, Ordering::SeqCst);
        let h = harness_with(provider, FakeGeo::At(coords), MemoryStore::new());

        let outcome = h.app.search_by_location().await;

        assert!(matches!(outcome, Outcome::Failed(WeatherError::Network { .. })));
        assert_eq!(h.calls(), vec![Call::Current(Query::Coords(coords), Unit::Metric)]);
        assert_eq!(h.app.current_city(), None);
        assert!(h.app.recent().is_empty());

        let events = h.renderer.events();
        assert!(events.contains(&Event::Error(OFFLINE_MESSAGE.to_string())));
        assert!(events.contains(&Event::ClearForecast));
        assert!(!events.iter().any(|e| matches!(e, Event::Query(_) | Event::Weather(_))));
        assert_eq!(events.last(), Some(&Event::Loading(false)));
    }

    #[tokio::test]
    async fn location_unsupported_shows_error_without_loading() {
        let h = harness();

        let outcome = h.app.search_by_location().await;

        assert_eq!(
            outcome,
            Outcome::Failed(WeatherError::Geolocation(GeolocationError::Unsupported))
        );
        assert_eq!(
            h.renderer.events(),
            vec![Event::Error(crate::error::LOCATION_UNSUPPORTED_MESSAGE.to_string())]
        );
    }

    #[tokio::test]
    async fn location_denied_shows_error_and_clears_loading() {
        let h = harness_with(FakeProvider::new(), FakeGeo::Denied, MemoryStore::new());

        let outcome = h.app.search_by_location().await;

        assert!(matches!(outcome, Outcome::Failed(WeatherError::Geolocation(_))));
        assert!(h.calls().is_empty());
        let events = h.renderer.events();
        assert!(events.contains(&Event::Error(crate::error::LOCATION_FAILURE_MESSAGE.to_string())));
        assert_eq!(events.last(), Some(&Event::Loading(false)));
    }

    #[tokio::test]
    async fn startup_restores_persisted_preferences() {
        let store = MemoryStore::new();
        store.set(RECENT_SEARCHES_KEY, r#"["Rome","Oslo"]"#).unwrap();
        store.set(UNIT_PREFERENCE_KEY, "imperial").unwrap();
        let h = harness_with(FakeProvider::new(), FakeGeo::Missing, store);

        h.app.start();

        assert_eq!(h.app.unit(), Unit::Imperial);
        assert_eq!(
            h.renderer.events(),
            vec![Event::Unit(Unit::Imperial), Event::Recent(vec!["Rome".into(), "Oslo".into()])]
        );
    }

    #[tokio::test]
    async fn storage_failures_do_not_break_searches() {
        let hook = RecordingHook::default();
        let renderer = RecordingRenderer::default();
        let app = App::new(
            Box::new(FakeProvider::new()),
            Box::new(FakeGeo::Missing),
            Preferences::with_hook(BrokenStore, hook.clone()),
            Box::new(renderer.clone()),
            Unit::Imperial,
            DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap()),
        );
        assert_eq!(app.unit(), Unit::Imperial);

        let outcome = app.search("Paris").await;
        app.set_unit(Unit::Metric).await;

        assert_eq!(outcome, Outcome::Displayed { forecast: true });
        assert!(!renderer.events().iter().any(|e| matches!(e, Event::Error(_))));
        // Two failed loads at startup, then the recent-list and unit writes.
        assert_eq!(hook.reports.lock().len(), 4);
    }

    /// Provider whose first current-weather call finishes after the second.
    #[derive(Debug)]
    struct SlowFirstProvider {
        release: Arc<tokio::sync::Notify>,
        first: AtomicBool,
    }

    #[async_trait]
    impl WeatherProvider for SlowFirstProvider {
        fn has_api_key(&self) -> bool {
            true
        }

        async fn fetch_current(
            &self,
            query: &Query,
            _unit: Unit,
        ) -> Result<WeatherSnapshot, WeatherError> {
            if self.first.swap(false, Ordering::SeqCst) {
                self.release.notified().await;
            }
            match query {
                Query::City(city) => Ok(snapshot(city)),
                Query::Coords(_) => Ok(snapshot("Lyon")),
            }
        }

        async fn fetch_forecast(&self, _city: &str, _unit: Unit) -> Option<Forecast> {
            None
        }
    }

    fn slow_first_app(release: Arc<tokio::sync::Notify>) -> (App, RecordingRenderer) {
        let renderer = RecordingRenderer::default();
        let app = App::new(
            Box::new(SlowFirstProvider { release, first: AtomicBool::new(true) }),
            Box::new(FakeGeo::Missing),
            Preferences::new(MemoryStore::new()),
            Box::new(renderer.clone()),
            Unit::Metric,
            DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap()),
        );
        (app, renderer)
    }

    fn rendered_weather(renderer: &RecordingRenderer) -> Vec<CurrentView> {
        renderer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Weather(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let release = Arc::new(tokio::sync::Notify::new());
        let (app, renderer) = slow_first_app(release.clone());

        let slow = app.search("Paris");
        let fast = async {
            let outcome = app.search("Berlin").await;
            release.notify_one();
            outcome
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert_eq!(slow, Outcome::Superseded);
        assert_eq!(fast, Outcome::Displayed { forecast: false });
        assert_eq!(app.current_city().as_deref(), Some("Berlin"));
        assert_eq!(app.recent().as_slice(), ["Berlin"]);

        let rendered: Vec<_> =
            rendered_weather(&renderer).into_iter().map(|v| v.location).collect();
        assert_eq!(rendered, ["Berlin, FR"]);
    }

    #[tokio::test]
    async fn unit_change_repeats_running_search_in_new_unit() {
        let release = Arc::new(tokio::sync::Notify::new());
        let (app, renderer) = slow_first_app(release.clone());

        let slow = app.search("Paris");
        let toggle = async {
            let outcome = app.set_unit(Unit::Imperial).await;
            release.notify_one();
            outcome
        };
        let (slow, toggle) = tokio::join!(slow, toggle);

        assert_eq!(slow, Outcome::Superseded);
        assert_eq!(toggle, Outcome::Displayed { forecast: false });
        assert_eq!(app.unit(), Unit::Imperial);
        assert_eq!(app.current_city().as_deref(), Some("Paris"));
        assert_eq!(app.recent().as_slice(), ["Paris"]);

        let temperatures: Vec<_> =
            rendered_weather(&renderer).into_iter().map(|v| v.temperature).collect();
        assert_eq!(temperatures, ["15°F"]);
        assert_eq!(renderer.events().last(), Some(&Event::Loading(false)));
    }
}
