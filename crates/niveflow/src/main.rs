//! niveflow CLI - keeps documentation sites in sync with their sources.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::{Config, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "niveflow")]
#[command(about = "Builds documentation sites from git repositories and local folders")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to niveflow.toml
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create meta.json and a starter niveflow.toml
    Init,

    /// Build a local docs folder once
    Build {
        /// Folder to build (defaults to the current directory)
        dir: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "_documents")]
        output: PathBuf,
    },

    /// Sync all sources once and rebuild what changed
    Sync {
        /// Rebuild every selected source
        #[arg(short, long)]
        force: bool,

        /// Only sync and build this source
        #[arg(long)]
        only: Option<String>,
    },

    /// Run once, then check again on the configured schedule
    Monitor,

    /// Run the webhook server and the scheduler
    Serve {
        /// Do not run scheduled checks
        #[arg(long)]
        no_schedule: bool,
    },

    /// Build one source locally and rebuild it on change
    Dev {
        /// Source to preview (defaults to the first configured)
        #[arg(short, long)]
        name: Option<String>,

        /// Port to listen on
        #[arg(short, long, default_value = "7777")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Serve an already built site
    Preview {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve
        #[arg(short, long, default_value = "dist")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init => commands::init::run(&cli.config)?,
        Commands::Build { dir, output } => {
            let config = Config::load(&cli.config)?;
            commands::build::run(&config, dir, output).await?;
        }
        Commands::Sync { force, only } => {
            let config = Config::load(&cli.config)?;
            commands::sync::run(&config, force, only).await?;
        }
        Commands::Monitor => {
            let config = Config::load(&cli.config)?;
            commands::monitor::run(&config).await?;
        }
        Commands::Serve { no_schedule } => {
            let config = Config::load(&cli.config)?;
            commands::serve::run(&config, !no_schedule).await?;
        }
        Commands::Dev {
            name,
            port,
            no_open,
        } => {
            let config = Config::load(&cli.config)?;
            commands::dev::run(&config, name, port, !no_open).await?;
        }
        Commands::Preview { port, dir } => {
            commands::preview::run(port, dir).await?;
        }
    }

    Ok(())
}
