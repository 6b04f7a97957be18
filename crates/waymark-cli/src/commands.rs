//! Command parsing and execution for the `waymark` binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};

use waymark_core::{
    Config, DisabledGeocoder, GeocodingService, JsonStore, LatLon, Marker, MarkerRepository,
    NominatimGeocoder, PointDescription,
};

/// How long to wait for outstanding address lookups before exiting.
const LOOKUP_TIMEOUT_SECS: u64 = 20;

pub const USAGE: &str = "\
Usage: waymark <command>

Commands:
  list                          Show active markers
  history                       Show marker history
  add <lat> <lon> [name...]     Add a marker (no name: look up its address)
  remove <n>                    Delete active marker n
  remove-history <n>            Delete history marker n
  archive <n>                   Move active marker n to history
  restore <n>                   Move history marker n back to the active list
  clear                         Move all active markers to history
  clear-history                 Delete all history markers
  reverse                       Reverse the order of active markers
  move <n> <lat> <lon>          Move active marker n
  select <n> on|off             Select or deselect active marker n
  resolve                       Look up addresses for markers still waiting
  config                        Show configuration
  config start-from-my-location on|off
                                Set the routing start preference";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    History,
    Add { point: LatLon, name: Option<String> },
    Remove(usize),
    RemoveHistory(usize),
    Archive(usize),
    Restore(usize),
    Clear,
    ClearHistory,
    Reverse,
    Move { index: usize, point: LatLon },
    Select { index: usize, selected: bool },
    Resolve,
    ShowConfig,
    SetStartFromMyLocation(bool),
    Help,
}

/// Parse a 1-based marker number as shown by `list` into a list index.
fn parse_index(arg: Option<&String>) -> Result<usize> {
    let arg = arg.context("Missing marker number")?;
    let n: usize = arg
        .parse()
        .with_context(|| format!("Invalid marker number: {}", arg))?;
    if n == 0 {
        bail!("Marker numbers start at 1");
    }
    Ok(n - 1)
}

fn parse_point(lat: Option<&String>, lon: Option<&String>) -> Result<LatLon> {
    let lat = lat.context("Missing latitude")?;
    let lon = lon.context("Missing longitude")?;
    let latitude: f64 = lat
        .parse()
        .with_context(|| format!("Invalid latitude: {}", lat))?;
    let longitude: f64 = lon
        .parse()
        .with_context(|| format!("Invalid longitude: {}", lon))?;
    if !(-90.0..=90.0).contains(&latitude) {
        bail!("Latitude out of range: {}", latitude);
    }
    if !(-180.0..=180.0).contains(&longitude) {
        bail!("Longitude out of range: {}", longitude);
    }
    Ok(LatLon::new(latitude, longitude))
}

fn parse_switch(arg: Option<&String>) -> Result<bool> {
    match arg.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("on") | Some("true") | Some("yes") => Ok(true),
        Some("off") | Some("false") | Some("no") => Ok(false),
        Some(other) => bail!("Expected on or off, got: {}", other),
        None => bail!("Expected on or off"),
    }
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::List);
        };
        let command = match name.as_str() {
            "list" | "ls" => Command::List,
            "history" => Command::History,
            "add" => {
                let point = parse_point(args.get(1), args.get(2))?;
                let name = args[3.min(args.len())..].join(" ");
                Command::Add {
                    point,
                    name: (!name.trim().is_empty()).then(|| name.trim().to_string()),
                }
            }
            "remove" | "rm" => Command::Remove(parse_index(args.get(1))?),
            "remove-history" => Command::RemoveHistory(parse_index(args.get(1))?),
            "archive" => Command::Archive(parse_index(args.get(1))?),
            "restore" => Command::Restore(parse_index(args.get(1))?),
            "clear" => Command::Clear,
            "clear-history" => Command::ClearHistory,
            "reverse" => Command::Reverse,
            "move" => Command::Move {
                index: parse_index(args.get(1))?,
                point: parse_point(args.get(2), args.get(3))?,
            },
            "select" => Command::Select {
                index: parse_index(args.get(1))?,
                selected: parse_switch(args.get(2))?,
            },
            "resolve" => Command::Resolve,
            "config" => match args.get(1).map(String::as_str) {
                None => Command::ShowConfig,
                Some("start-from-my-location") => {
                    Command::SetStartFromMyLocation(parse_switch(args.get(2))?)
                }
                Some(other) => bail!("Unknown config setting: {}", other),
            },
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };
        Ok(command)
    }

    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::List | Command::History | Command::ShowConfig | Command::Help
        )
    }
}

fn format_marker(marker: &Marker) -> String {
    let created = marker.created_at.with_timezone(&Local).format("%b %d, %Y %H:%M");
    format!(
        "{:>3}. {}{} [{}] ({}) added {}",
        marker.index + 1,
        if marker.is_selected() { "* " } else { "" },
        marker.display_name(),
        marker.color,
        marker.point,
        created
    )
}

fn print_markers(title: &str, markers: &[Marker]) {
    if markers.is_empty() {
        println!("No {} markers.", title);
        return;
    }
    for marker in markers {
        println!("{}", format_marker(marker));
    }
}

fn pick(markers: &[Marker], index: usize) -> Result<Marker> {
    markers
        .get(index)
        .cloned()
        .with_context(|| format!("No marker number {}", index + 1))
}

fn open_repository(config: &Config) -> Result<MarkerRepository<JsonStore>> {
    let store_path = config.store_path()?;
    let store = JsonStore::new(store_path.clone())
        .with_context(|| format!("Failed to open marker store: {}", store_path.display()))?;

    let geocoder: Arc<dyn GeocodingService> = if config.offline {
        Arc::new(DisabledGeocoder)
    } else {
        Arc::new(NominatimGeocoder::new(config.nominatim_settings())?)
    };

    MarkerRepository::open(store, geocoder).context("Failed to load markers")
}

pub async fn run(command: Command, config: &mut Config) -> Result<()> {
    match command {
        Command::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        Command::ShowConfig => {
            println!("Config file: {}", Config::config_path()?.display());
            println!("Marker store: {}", config.store_path()?.display());
            println!("{}", serde_json::to_string_pretty(config)?);
            return Ok(());
        }
        Command::SetStartFromMyLocation(value) => {
            config.start_from_my_location = value;
            config.save()?;
            println!("Routes start from my location: {}", if value { "on" } else { "off" });
            return Ok(());
        }
        _ => {}
    }

    let mut repo = open_repository(config)?;
    let read_only = command.is_read_only();

    match command {
        Command::List => print_markers("active", &repo.active_markers()),
        Command::History => print_markers("history", &repo.history_markers()),
        Command::Add { point, name } => {
            repo.add_marker(point, name.map(PointDescription::named))?;
            info!(%point, "Marker added from command line");
        }
        Command::Remove(index) => {
            let marker = pick(&repo.active_markers(), index)?;
            repo.remove_active(&marker)?;
        }
        Command::RemoveHistory(index) => {
            let marker = pick(&repo.history_markers(), index)?;
            repo.remove_history(&marker)?;
        }
        Command::Archive(index) => {
            let marker = pick(&repo.active_markers(), index)?;
            repo.archive_marker(&marker)?;
        }
        Command::Restore(index) => {
            let marker = pick(&repo.history_markers(), index)?;
            let end = repo.active_markers().len();
            repo.restore_marker(&marker, end)?;
        }
        Command::Clear => repo.clear_active()?,
        Command::ClearHistory => repo.clear_history()?,
        Command::Reverse => repo.reverse_active_order()?,
        Command::Move { index, point } => {
            let marker = pick(&repo.active_markers(), index)?;
            repo.move_marker(&marker, point)?;
        }
        Command::Select { index, selected } => {
            let marker = pick(&repo.active_markers(), index)?;
            repo.select(&marker, selected)?;
        }
        Command::Resolve => {
            let issued = repo.resolve_all();
            println!("Looking up {} address(es)...", issued);
        }
        Command::ShowConfig | Command::SetStartFromMyLocation(_) | Command::Help => {}
    }

    if read_only {
        return Ok(());
    }

    if repo.pending_lookups() > 0 {
        if config.offline {
            warn!("Offline mode, skipping address lookups");
        } else {
            let applied = repo
                .settle_addresses(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
                .await;
            info!(applied, "Address lookups finished");
        }
    }

    print_markers("active", &repo.active_markers());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_defaults_to_list() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::List);
    }

    #[test]
    fn test_parse_add_with_and_without_name() {
        assert_eq!(
            Command::parse(&args("add 10 20 Base Camp")).unwrap(),
            Command::Add {
                point: LatLon::new(10.0, 20.0),
                name: Some("Base Camp".to_string()),
            }
        );
        assert_eq!(
            Command::parse(&args("add -33.5 151.25")).unwrap(),
            Command::Add {
                point: LatLon::new(-33.5, 151.25),
                name: None,
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_coordinates() {
        assert!(Command::parse(&args("add 91 0")).is_err());
        assert!(Command::parse(&args("add 0 181")).is_err());
        assert!(Command::parse(&args("add north 0")).is_err());
        assert!(Command::parse(&args("add 10")).is_err());
    }

    #[test]
    fn test_parse_marker_numbers_are_one_based() {
        assert_eq!(Command::parse(&args("remove 1")).unwrap(), Command::Remove(0));
        assert_eq!(
            Command::parse(&args("move 3 1 2")).unwrap(),
            Command::Move {
                index: 2,
                point: LatLon::new(1.0, 2.0),
            }
        );
        assert!(Command::parse(&args("remove 0")).is_err());
        assert!(Command::parse(&args("remove")).is_err());
    }

    #[test]
    fn test_parse_switches() {
        assert_eq!(
            Command::parse(&args("select 2 on")).unwrap(),
            Command::Select {
                index: 1,
                selected: true,
            }
        );
        assert_eq!(
            Command::parse(&args("config start-from-my-location off")).unwrap(),
            Command::SetStartFromMyLocation(false)
        );
        assert!(Command::parse(&args("select 2 maybe")).is_err());
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(Command::parse(&args("teleport")).is_err());
        assert_eq!(Command::parse(&args("--help")).unwrap(), Command::Help);
    }
}
