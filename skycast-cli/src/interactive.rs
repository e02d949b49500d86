//! Prompt loop mirroring the controls of the search page: a city input, a
//! location button, unit toggles and recent-search chips.

use anyhow::Result;
use inquire::{InquireError, Text};
use skycast_core::{App, Unit};

const HELP: &str = "\
Type a city name to search, or one of:
  :here           weather at your current location
  :units <unit>   switch to metric or imperial
  :recent <n>     repeat recent search number n
  :help           show this help
  :quit           leave";

#[derive(Debug, PartialEq)]
pub enum Input {
    Search(String),
    Here,
    Units(Unit),
    Recent(usize),
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return Input::Search(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match (name, arg) {
        ("here", None) => Input::Here,
        ("help", None) => Input::Help,
        ("quit" | "q" | "exit", None) => Input::Quit,
        ("units", Some(arg)) => match arg.parse() {
            Ok(unit) => Input::Units(unit),
            Err(e) => Input::Invalid(e.to_string()),
        },
        ("recent", Some(arg)) => match arg.parse::<usize>() {
            Ok(n) if n > 0 => Input::Recent(n),
            _ => Input::Invalid(format!("'{arg}' is not a recent search number")),
        },
        _ => Input::Invalid(format!("Unknown command ':{command}'. Type :help for help.")),
    }
}

pub async fn run(app: &App) -> Result<()> {
    app.start();
    println!("{HELP}");

    loop {
        let line = match Text::new("City:").prompt() {
            Ok(line) => line,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_input(&line) {
            Input::Search(city) => {
                app.search(&city).await;
            }
            Input::Here => {
                app.search_by_location().await;
            }
            Input::Units(unit) => {
                app.set_unit(unit).await;
            }
            Input::Recent(n) => match app.recent().get(n - 1) {
                Some(city) => {
                    let city = city.to_string();
                    app.search_recent(&city).await;
                }
                None => eprintln!("No recent search number {n}."),
            },
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Invalid(message) => eprintln!("{message}"),
        }
    }

    Ok(())
}
