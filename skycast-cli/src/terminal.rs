//! Terminal rendering of the view models.

use skycast_core::{CurrentView, ForecastView, RecentView, Renderer, Unit};

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRenderer;

pub fn format_weather(view: &CurrentView) -> String {
    let rows = [
        ("Feels Like", view.feels_like.clone()),
        ("Humidity", view.humidity.clone()),
        ("Wind Speed", view.wind.clone()),
        ("Pressure", view.pressure.clone()),
        ("Sunrise", format!("🌅 {}", view.sunrise)),
        ("Sunset", format!("🌇 {}", view.sunset)),
    ];

    let mut out = format!(
        "\n{}  {}\n   {}  {}\n",
        view.icon, view.location, view.temperature, view.condition
    );
    for (label, value) in rows {
        out.push_str(&format!("   {label:<11}{value}\n"));
    }
    out
}

pub fn format_forecast(view: &ForecastView) -> String {
    let mut out = format!("\n{}\n", view.title);
    for day in &view.days {
        out.push_str(&format!(
            "   {:<4}{}  {:>6}  {}\n",
            day.day, day.icon, day.temperature, day.description
        ));
    }
    out
}

/// Chips are numbered from 1, matching `skycast recent <n>`.
pub fn format_recent(view: &RecentView) -> Option<String> {
    if view.is_empty() {
        return None;
    }
    let chips: Vec<String> =
        view.cities.iter().enumerate().map(|(i, city)| format!("[{}] {city}", i + 1)).collect();
    Some(format!("Recent Searches: {}", chips.join("  ")))
}

pub fn format_units(active: Unit) -> String {
    let labels: Vec<String> = Unit::all()
        .iter()
        .map(|u| if *u == active { format!("[{u}]") } else { u.to_string() })
        .collect();
    format!("Units: {}", labels.join(" "))
}

impl Renderer for TerminalRenderer {
    fn show_weather(&self, view: &CurrentView) {
        print!("{}", format_weather(view));
    }

    fn show_forecast(&self, view: &ForecastView) {
        print!("{}", format_forecast(view));
    }

    fn clear_forecast(&self) {}

    fn show_recent(&self, view: &RecentView) {
        if let Some(line) = format_recent(view) {
            println!("{line}");
        }
    }

    fn show_error(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn show_status(&self, message: &str) {
        eprintln!("{message}");
    }

    fn set_loading(&self, loading: bool) {
        if loading {
            eprintln!("Loading...");
        }
    }

    fn highlight_unit(&self, unit: Unit) {
        println!("{}", format_units(unit));
    }

    fn set_query(&self, text: &str) {
        println!("> {text}");
    }
}
