//! Restodir CLI - inspect and exercise a restaurant directory database

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use restodir::output::OutputMode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "restodir")]
#[command(version)]
#[command(about = "Restaurant directory persistence layer")]
#[command(long_about = r#"
Restodir stores a restaurant directory (cities, types, restaurants, likes,
reviews and their grades) in SQLite and maps it onto a shared object graph.

Example usage:
  restodir init
  restodir demo
  restodir restaurants --search mario
  restodir stats --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database schema
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Show row counts per table
    Stats,

    /// List restaurants with their city, type and evaluations
    Restaurants {
        /// Only restaurants whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create a restaurant with evaluations, read it back and delete it
    Demo {
        /// Keep the demo restaurant instead of deleting it
        #[arg(long)]
        keep: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = OutputMode::from_flag(cli.json);
    let settings = commands::Settings::resolve(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Init { force } => commands::run_init(&settings, force, output_mode)?,
        Commands::Stats => commands::run_stats(&settings, output_mode)?,
        Commands::Restaurants { search } => {
            commands::run_restaurants(&settings, search.as_deref(), output_mode)?
        }
        Commands::Demo { keep } => commands::run_demo(&settings, keep, output_mode)?,
    }

    Ok(())
}
