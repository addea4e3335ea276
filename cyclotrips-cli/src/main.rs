// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! cyclotrips - export a Vélo'v / Cyclocity trip history to JSON.
//!
//! # Examples
//!
//! ```bash
//! # Export with the password from the environment
//! CYCLOTRIPS_USERNAME=me@example.com CYCLOTRIPS_PASSWORD=... \
//!   CYCLOTRIPS_ACCOUNT_ID=123456 cyclotrips
//!
//! # Keep the password in the system keychain instead
//! cyclotrips credentials set --username me@example.com < password.txt
//!
//! # Fall back to a real browser when the direct path is blocked
//! cyclotrips export --source auto
//!
//! # Every page of the history, JSON run report
//! cyclotrips --format json export --all-pages
//!
//! # Route lines for a map
//! cyclotrips geojson --output public/velov-trips.geojson
//! ```

mod commands;
mod output;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cyclotrips_core::FailureKind;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{credentials, export, geojson};

// ============================================================================
// CLI Definition
// ============================================================================

/// cyclotrips - bike-share trip history exporter.
#[derive(Parser)]
#[command(name = "cyclotrips")]
#[command(about = "Export a Vélo'v (Cyclocity) trip history to a local JSON dataset")]
#[command(long_about = r#"
cyclotrips signs in to a Cyclocity bike-share account, downloads the trip
history and writes it as a normalized JSON array.

Sources:
  • direct   OAuth password grant, then the trip API (default)
  • browser  Logs in through a real browser driven over WebDriver
  • auto     direct, falling back to browser when blocked (403/429/network)

Examples:
  cyclotrips                           # Export with env/keychain credentials
  cyclotrips export --all-pages        # Every page of the history
  cyclotrips --format json             # Machine-readable run report
  cyclotrips credentials status -u me  # Is a password stored?
  cyclotrips geojson --points          # Start/end points for a heatmap
"#)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'export' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Export arguments when no subcommand is given.
    #[command(flatten)]
    pub export: export::ExportArgs,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch trips and write the dataset (default if no command specified).
    #[command(visible_alias = "e")]
    Export(export::ExportArgs),

    /// Manage the password stored in the system keychain.
    Credentials(credentials::CredentialsArgs),

    /// Convert a written dataset to GeoJSON.
    #[command(visible_alias = "g")]
    Geojson(geojson::GeojsonArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success, including an empty history.
    Success = 0,
    /// Configuration or any other error.
    Error = 1,
    /// Credentials rejected or session not authenticated.
    Auth = 2,
    /// Network failure.
    Transport = 3,
    /// Unexpected response shape or status.
    Response = 4,
    /// Dataset could not be read or written.
    Io = 5,
    /// Browser automation failed.
    Automation = 6,
}

impl ExitCode {
    /// Picks the exit code for a failure.
    pub fn for_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Auth => Self::Auth,
            FailureKind::Transport => Self::Transport,
            FailureKind::Shape | FailureKind::Status => Self::Response,
            FailureKind::Io => Self::Io,
            FailureKind::Automation => Self::Automation,
            FailureKind::Record | FailureKind::Config => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("cyclotrips=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cyclotrips=warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Export(args)) => export::run(args, &cli).await,
        Some(Commands::Credentials(args)) => credentials::run(args, &cli).await,
        Some(Commands::Geojson(args)) => geojson::run(args, &cli).await,
        None => export::run(&cli.export, &cli).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
