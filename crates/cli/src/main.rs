use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordinator::SchedulerConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod fleet;
mod sim;

const CONFIG_FILE: &str = "fleet-sim.toml";
const DEFAULT_CYCLES: u32 = 2;

#[derive(Parser)]
#[command(name = "fleet-sim")]
#[command(about = "Simulated mission driver for the fleet coordination core", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event-driven fleet through whole gathering cycles
    Run {
        #[arg(short = 'n', long, default_value_t = DEFAULT_CYCLES)]
        cycles: u32,

        #[arg(short, long, default_value_t = 1)]
        team: usize,
    },
    /// Drive the cross-robot scheduler against scripted robots, logging
    /// every goal it dispatches
    Schedule {
        #[arg(long, default_value_t = 60)]
        ticks: u32,

        #[arg(short, long, default_value_t = 1)]
        team: usize,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub scheduler: SchedulerConfig,
    pub mission: MissionConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// How long a simulated action takes to succeed, in milliseconds.
    pub goal_duration_ms: u64,
    /// Abort the mission if it runs longer than this.
    pub max_mission_secs: u64,
    pub scout_start: [f64; 2],
    pub excavator_start: [f64; 2],
    pub hauler_start: [f64; 2],
    /// Where the hauler waits while the scout sweeps.
    pub lookout: [f64; 2],
    /// Scripted volatile locations, one per gathering cycle.
    pub volatiles: Vec<[f64; 2]>,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            goal_duration_ms: 300,
            max_mission_secs: 300,
            scout_start: [0.0, 0.0],
            excavator_start: [12.0, 4.0],
            hauler_start: [-6.0, 14.0],
            lookout: [8.0, 10.0],
            volatiles: vec![[14.0, 6.0], [-9.0, 11.0], [3.0, -12.0], [17.0, -5.0]],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Run { cycles, team }) => fleet::run_mission(team, cycles, &config).await,
        Some(Commands::Schedule { ticks, team }) => {
            fleet::run_schedule_demo(team, ticks, &config).await
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        None => fleet::run_mission(1, DEFAULT_CYCLES, &config).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<FleetConfig> {
    let path = path.unwrap_or(Path::new(CONFIG_FILE));
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    } else {
        Ok(FleetConfig::default())
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_sim=info,coordinator=info".into()),
        )
        .init();
}
