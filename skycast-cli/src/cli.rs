use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Select};
use skycast_core::{
    App, Config, Coordinates, DisplayZone, FileStore, FixedLocation, Geolocator, Outcome,
    Preferences, Unit, geolocator_from_config, provider_from_config,
};
use tracing::info;

use crate::{interactive, terminal::TerminalRenderer};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Current weather and 5-day forecasts from OpenWeather")]
pub struct Cli {
    /// Verbosity level (-v, -vv, ...)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `interactive`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and default units.
    Configure,

    /// Show weather for a city.
    Search {
        /// City name, e.g. "Paris" or "New York".
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },

    /// Show weather for your current location.
    Here {
        /// Latitude to use instead of looking up the device position.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude to use instead of looking up the device position.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Switch between metric and imperial units.
    Units {
        unit: Unit,
    },

    /// List recent searches, or repeat one by its number.
    Recent {
        index: Option<usize>,
    },

    /// Search repeatedly from a prompt.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        let config = Config::load()?;

        let outcome = match self.command.unwrap_or(Command::Interactive) {
            Command::Configure => {
                configure(config)?;
                return Ok(ExitCode::SUCCESS);
            }
            Command::Search { city } => {
                let app = build_app(&config, default_geolocator(&config))?;
                app.search(&city.join(" ")).await
            }
            Command::Here { lat, lon } => {
                let geolocator: Box<dyn Geolocator> = match (lat, lon) {
                    (Some(latitude), Some(longitude)) => {
                        Box::new(FixedLocation(Coordinates { latitude, longitude }))
                    }
                    _ => default_geolocator(&config),
                };
                let app = build_app(&config, geolocator)?;
                app.search_by_location().await
            }
            Command::Units { unit } => {
                let app = build_app(&config, default_geolocator(&config))?;
                app.set_unit(unit).await
            }
            Command::Recent { index: None } => {
                let app = build_app(&config, default_geolocator(&config))?;
                app.start();
                if app.recent().is_empty() {
                    println!("No recent searches yet.");
                }
                Outcome::Unchanged
            }
            Command::Recent { index: Some(n) } => {
                let app = build_app(&config, default_geolocator(&config))?;
                let Some(city) = n.checked_sub(1).and_then(|i| app.recent().get(i).map(str::to_owned))
                else {
                    anyhow::bail!("No recent search number {n}. Run `skycast recent` to list them.");
                };
                app.search_recent(&city).await
            }
            Command::Interactive => {
                let app = build_app(&config, default_geolocator(&config))?;
                interactive::run(&app).await?;
                Outcome::Unchanged
            }
        };

        Ok(match outcome {
            Outcome::Failed(_) => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        })
    }
}

fn default_geolocator(config: &Config) -> Box<dyn Geolocator> {
    geolocator_from_config(&config.geolocation, config.timeout())
}

fn build_app(config: &Config, geolocator: Box<dyn Geolocator>) -> Result<App> {
    let provider = provider_from_config(config).context("Failed to create weather client")?;
    let store = FileStore::new(Config::preferences_file_path()?);

    Ok(App::new(
        provider,
        geolocator,
        Preferences::new(store),
        Box::new(TerminalRenderer),
        config.units,
        DisplayZone::Local,
    ))
}

/// Interactive configuration of the API key and default units.
fn configure(mut config: Config) -> Result<()> {
    let replace_key = match config.api_key() {
        Some(_) => Confirm::new("An API key is already configured. Replace it?")
            .with_default(false)
            .prompt()?,
        None => true,
    };

    if replace_key {
        let key = Password::new("OpenWeather API key:")
            .without_confirmation()
            .with_help_message("Get a free key at https://openweathermap.org/api")
            .prompt()?;
        config.set_api_key(key);
    }

    let start = Unit::all().iter().position(|u| *u == config.units).unwrap_or_default();
    config.units = Select::new("Default units:", Unit::all().to_vec())
        .with_starting_cursor(start)
        .prompt()?;

    config.save()?;
    let path = Config::config_file_path()?;
    info!(path = %path.display(), "configuration saved");
    println!("Configuration saved to {}", path.display());

    Ok(())
}
