use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use imagery_common::{Coordinate, ResultMode};
use imagery_discovery::config::{self, ConfigSource};
use imagery_discovery::imagery::{
    CycleHandle, DiscoveryWorkflow, ImageryClient, WorkflowOptions,
};
use imagery_discovery::search::{NominatimGeocoder, SearchSession};
use imagery_discovery::DiscoveryError;

#[derive(Parser)]
#[command(
    name = "imagery-discovery",
    about = "Find recent, archived and upcoming satellite captures for a point"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Follow-up actions on the result screen, applied in order
    #[arg(long, value_enum, global = true)]
    then: Vec<Step>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Step {
    /// Switch to recent captures
    Recent,
    /// Switch to archive and future opportunities
    Timeline,
    /// Re-fetch the current mode
    Refresh,
}

#[derive(Subcommand)]
enum Command {
    /// Recent captures at a point
    Recent {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Archive captures and future opportunities at a point
    Timeline {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Geocode a place name, then show its captures
    Locate {
        query: String,
        /// Open the timeline instead of recent captures
        #[arg(long)]
        timeline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = config::read_config(&cli.config)?;
    let _logging_guard = imagery_discovery::logging::init_logging(
        &config.log_dir,
        "imagery-discovery",
        &config.log_level,
    )?;
    if source == ConfigSource::Defaults {
        tracing::warn!("Config file {} not found, using defaults", cli.config.display());
    }

    tracing::info!("Imagery discovery starting against {}", config.api_base_url);

    let imagery = Arc::new(ImageryClient::from_config(config)?);
    let geocoder = Arc::new(NominatimGeocoder::from_config(config)?);
    let mut search = SearchSession::new(imagery.clone(), geocoder, config.default_location()?);

    let mode = match &cli.command {
        Command::Recent { lat, lon } => {
            search.select_location(Coordinate::new(*lat, *lon)?).await;
            ResultMode::Recent
        }
        Command::Timeline { lat, lon } => {
            search.select_location(Coordinate::new(*lat, *lon)?).await;
            ResultMode::Timeline
        }
        Command::Locate { query, timeline } => {
            match search.search(query).await {
                Ok(Some(_)) => {}
                Ok(None) => anyhow::bail!("Empty search query"),
                Err(DiscoveryError::NotFound { .. }) => {
                    println!("Location not found. Please try another search term.");
                    return Ok(());
                }
                Err(e) => return Err(e).context("There was an error fetching the location"),
            }
            ResultMode::from_show_timeline(*timeline)
        }
    };

    println!(
        "Location: {} ({})",
        search.location_label().unwrap_or("Fetching..."),
        search.position()
    );

    let handoff = match mode {
        ResultMode::Recent => search.show_captures().await,
        ResultMode::Timeline => search.show_timeline().await,
    };
    let handoff = match handoff {
        Ok(handoff) => handoff,
        Err(e) => {
            tracing::error!("Error fetching {} data: {}", mode, e);
            println!("Failed to fetch {} data.", mode);
            return Ok(());
        }
    };

    let (workflow, initial) =
        DiscoveryWorkflow::enter(imagery, handoff, WorkflowOptions::from_config(config)).await;
    print_cycle(&workflow, initial).await;

    for step in &cli.then {
        let cycle = match step {
            Step::Recent => workflow.set_mode(ResultMode::Recent).await,
            Step::Timeline => workflow.set_mode(ResultMode::Timeline).await,
            Step::Refresh => Some(workflow.refresh().await),
        };
        match cycle {
            Some(cycle) => {
                println!();
                print_cycle(&workflow, cycle).await;
            }
            None => println!("Already showing {} captures.", workflow.mode().await),
        }
    }

    Ok(())
}

async fn print_cycle(workflow: &DiscoveryWorkflow, cycle: CycleHandle) {
    let report = cycle.wait().await;
    tracing::debug!("Cycle finished: {:?}", report);
    for feed in &report.failed {
        println!("Failed to fetch {} data.", feed);
    }
    print!("{}", workflow.view().await);
}
