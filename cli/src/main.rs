mod commands;
mod config;
mod logging;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    SetupArgs, cmd_body_delete, cmd_body_history, cmd_body_log, cmd_dashboard, cmd_delete,
    cmd_export, cmd_import, cmd_import_csv, cmd_log, cmd_reset, cmd_settings, cmd_setup,
    cmd_trend, cmd_weeks,
};
use crate::config::Config;
use flux_core::projection::MAX_TREND_DAYS;
use flux_core::service::TrackerService;

#[derive(Parser)]
#[command(
    name = "flux",
    version,
    about = "A local-first TDEE tracker",
    long_about = "\n\n  ███████╗██╗     ██╗   ██╗██╗  ██╗
  ██╔════╝██║     ██║   ██║╚██╗██╔╝
  █████╗  ██║     ██║   ██║ ╚███╔╝
  ██╔══╝  ██║     ██║   ██║ ██╔██╗
  ██║     ███████╗╚██████╔╝██╔╝ ██╗
  ╚═╝     ╚══════╝ ╚═════╝ ╚═╝  ╚═╝
     learn what you actually burn.
"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or replace your profile and goal
    Setup(SetupArgs),
    /// Show current settings
    Settings {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log weight and/or calories for a day (merges with an existing entry)
    Log {
        /// Morning weight in your configured units
        #[arg(short, long)]
        weight: Option<f64>,
        /// Total calories eaten
        #[arg(short, long)]
        calories: Option<f64>,
        /// Date to log for (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the day log for a date
    Delete {
        /// Date of the entry (YYYY-MM-DD or today/yesterday)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weekly summaries with raw and smoothed TDEE
    Weeks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show TDEE, calorie target, goal projection and streak
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily weights with a 7-day moving average
    Trend {
        /// Number of days to look back (1-366)
        #[arg(
            short,
            long,
            default_value = "30",
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TREND_DAYS))
        )]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body measurements and body fat
    Body {
        #[command(subcommand)]
        command: BodyCommands,
    },
    /// Export all data as a JSON bundle
    Export {
        /// File to write (default: stdout)
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a JSON bundle produced by `flux export`
    Import {
        /// Path to the bundle
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import day logs from a CSV file (Date, Weight, Calories columns)
    ImportCsv {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all settings and logs
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum BodyCommands {
    /// Log body measurements; body fat is computed when possible
    Log {
        /// Weight in your configured units
        #[arg(short, long)]
        weight: f64,
        /// Neck circumference (cm)
        #[arg(long)]
        neck: Option<f64>,
        /// Waist circumference (cm)
        #[arg(long)]
        waist: Option<f64>,
        /// Hip circumference (cm, required for the female formula)
        #[arg(long)]
        hips: Option<f64>,
        /// Body fat percentage, used when it cannot be computed
        #[arg(long)]
        bf: Option<f64>,
        /// Date to log for (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show body log history
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the body log for a date
    Delete {
        /// Date of the entry (YYYY-MM-DD or today/yesterday)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("Warning: logging disabled: {e:#}");
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db_path = config
        .db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let svc = TrackerService::new(db_path)?;

    match cli.command {
        Commands::Setup(args) => cmd_setup(&svc, args),
        Commands::Settings { json } => cmd_settings(&svc, json),
        Commands::Log {
            weight,
            calories,
            date,
            json,
        } => cmd_log(&svc, weight, calories, date, json),
        Commands::Delete { date, json } => cmd_delete(&svc, &date, json),
        Commands::Weeks { json } => cmd_weeks(&svc, json),
        Commands::Dashboard { json } => cmd_dashboard(&svc, json),
        Commands::Trend { days, json } => cmd_trend(&svc, days, json),
        Commands::Body { command } => match command {
            BodyCommands::Log {
                weight,
                neck,
                waist,
                hips,
                bf,
                date,
                json,
            } => cmd_body_log(&svc, weight, neck, waist, hips, bf, date, json),
            BodyCommands::History { json } => cmd_body_history(&svc, json),
            BodyCommands::Delete { date, json } => cmd_body_delete(&svc, &date, json),
        },
        Commands::Export { file, json } => cmd_export(&svc, file.as_deref(), json),
        Commands::Import { file, json } => cmd_import(&svc, &file, json),
        Commands::ImportCsv {
            file,
            dry_run,
            json,
        } => cmd_import_csv(&svc, &file, dry_run, json),
        Commands::Reset { yes, json } => cmd_reset(&svc, yes, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, created) = config.load_or_create_api_key()?;
                tracing::info!(created, "loaded API key");
                Some(key)
            };
            server::start_server(svc, port, &bind, api_key).await
        }
    }
}
