mod platform;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use platform::{LogDestination, StartView};

#[derive(Parser, Debug)]
#[command(name = "lance")]
#[command(about = "Live view of the AgentLance mesh and its jobs", long_about = None)]
struct Cli {
    /// RON config file; defaults to ./lance.ron when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Backend origin, overrides the config file.
    #[arg(long)]
    base_url: Option<String>,
    /// Where log lines go, overrides the config file.
    #[arg(long, value_enum)]
    log: Option<LogDestination>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the agent mesh topology and its live event feed.
    Mesh {
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
    },
    /// Follow the timeline of one job.
    Job { id: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = platform::config::load(cli.config.as_deref()).context("loading config")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(destination) = cli.log {
        config.log_destination = destination;
    }
    let start = match cli.command {
        Command::Mesh { width, height } => {
            config.width = width.unwrap_or(config.width);
            config.height = height.unwrap_or(config.height);
            StartView::Mesh
        }
        Command::Job { id } => StartView::Job(id),
    };
    config.validate().context("invalid config")?;

    platform::logging::initialize(config.log_destination, cli.verbose);
    platform::run_app(config, start)
}
