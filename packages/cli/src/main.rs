#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Headless command-line driver for the tech map.
//!
//! Fetches premises for a viewport the same way the map does, then prints
//! what the map would show: legend counts, points, detail views.
//!
//! Uses `indicatif-log-bridge` (via [`tech_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod open;
mod print;

use clap::{Parser, Subcommand};
use dialoguer::Select;
use tech_map_engine::PlanOutcome;
use tech_map_geo::{Bounds, LatLng, tiler};
use tech_map_mode::ModeId;

#[derive(Parser)]
#[command(name = "tech_map", about = "NBN technology map, headless")]
struct Cli {
    /// Classification mode (`all`, `upgrade`, `ee`, `fw`)
    #[arg(long, global = true)]
    mode: Option<ModeId>,
    /// Keep premises in memory instead of the `DuckDB` place store
    #[arg(long, global = true)]
    memory: bool,
    /// Include raw records in detail output
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Where to look. Anything omitted comes from the saved session.
#[derive(clap::Args, Clone, Copy)]
struct Position {
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lng: Option<f64>,
    #[arg(long)]
    zoom: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a viewport and print the legend with counts
    View {
        #[command(flatten)]
        position: Position,
    },
    /// Print the grid boxes covering some bounds
    Tiles {
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
    },
    /// List the classification modes
    Modes,
    /// Show the stored detail of one premise
    Place {
        /// Premise id (e.g. `LOC000012345678`)
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a viewport and list its aggregate points
    Points {
        #[command(flatten)]
        position: Position,
        /// Maximum number of points to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tech_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let options = open::Options {
        mode: cli.mode,
        memory: cli.memory,
        debug: cli.debug,
    };

    let Some(command) = cli.command else {
        return interactive(&multi, options).await;
    };

    match command {
        Commands::View { position } => {
            let (map, outcome) = open::open_map(&multi, options, position.into()).await?;
            explain(&outcome);
            print::legend(&map);
        }
        Commands::Tiles {
            north,
            south,
            east,
            west,
        } => {
            let config = open::load_config()?;
            let bounds = Bounds::new(north, south, east, west)?;
            let boxes = tiler::tile(&bounds, &config.grid()?);
            print::tiles(&boxes);
        }
        Commands::Modes => {
            for id in ModeId::ALL {
                println!("{:<10} {}", id.as_ref(), id.display_name());
            }
        }
        Commands::Place { id, json } => {
            let detail = open::place_detail(options, &id).await?;
            match detail {
                Some(detail) if json => println!("{}", serde_json::to_string_pretty(&detail)?),
                Some(detail) => print::detail(&detail),
                None => println!("No stored premise with id {id}"),
            }
        }
        Commands::Points { position, limit } => {
            let (map, outcome) = open::open_map(&multi, options, position.into()).await?;
            explain(&outcome);
            print::points(&map, limit).await?;
        }
    }

    Ok(())
}

/// Prompts for a mode and shows the saved view in it.
async fn interactive(
    multi: &tech_map_cli_utils::MultiProgress,
    options: open::Options,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("NBN Tech Map");
    println!();

    let labels: Vec<&str> = ModeId::ALL.iter().map(|id| id.display_name()).collect();
    let idx = Select::new()
        .with_prompt("Which map would you like to see?")
        .items(&labels)
        .default(0)
        .interact()?;

    let options = open::Options {
        mode: Some(ModeId::ALL[idx]),
        ..options
    };
    let (map, outcome) = open::open_map(multi, options, open::Override::default()).await?;
    explain(&outcome);
    print::legend(&map);
    Ok(())
}

impl From<Position> for open::Override {
    fn from(position: Position) -> Self {
        let center = match (position.lat, position.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        };
        Self {
            center,
            zoom: position.zoom,
        }
    }
}

/// Tells the user why nothing was fetched.
fn explain(outcome: &PlanOutcome) {
    match outcome {
        PlanOutcome::ZoomTooLow { zoom, min_zoom } => {
            println!("Zoom {zoom} is too far out; zoom in to {min_zoom} or more to load premises.");
        }
        PlanOutcome::TooManyBoxes { count, max } => {
            println!("This view needs {count} areas but at most {max} are loaded at once; zoom in.");
        }
        PlanOutcome::NothingToFetch => {}
        PlanOutcome::Batch(report) => {
            if report.failed > 0 {
                println!(
                    "{} of {} areas failed to load; see the log for details.",
                    report.failed, report.total
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn latitude_needs_longitude() {
        assert!(Cli::try_parse_from(["tech_map", "view", "--lat", "-33.8"]).is_err());
        assert!(Cli::try_parse_from(["tech_map", "points", "--lng", "151.2"]).is_err());
    }

    #[test]
    fn full_position_becomes_an_override() {
        let cli =
            Cli::try_parse_from(["tech_map", "view", "--lat", "-33.8", "--lng", "151.2", "--zoom", "15"])
                .unwrap();
        let Some(Commands::View { position }) = cli.command else {
            panic!("expected the view command");
        };

        let position = open::Override::from(position);
        assert_eq!(position.center, Some(LatLng::new(-33.8, 151.2)));
        assert_eq!(position.zoom, Some(15));
    }

    #[test]
    fn zoom_alone_keeps_the_saved_centre() {
        let cli = Cli::try_parse_from(["tech_map", "view", "--zoom", "13"]).unwrap();
        let Some(Commands::View { position }) = cli.command else {
            panic!("expected the view command");
        };

        let position = open::Override::from(position);
        assert_eq!(position.center, None);
        assert_eq!(position.zoom, Some(13));
    }
}
