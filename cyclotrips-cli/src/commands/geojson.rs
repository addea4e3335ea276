//! GeoJSON command - convert the dataset for mapping.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use cyclotrips_store::{read_dataset, write_geojson, GeoJsonLayout, StoreError, DEFAULT_OUTPUT_PATH};

use crate::output::{JsonFormatter, TextFormatter};
use crate::report::GeojsonReport;
use crate::{Cli, ExitCode, OutputFormat};

/// Default GeoJSON path.
pub const DEFAULT_GEOJSON_PATH: &str = "public/velov-trips.geojson";

/// Arguments for the geojson command.
#[derive(Args)]
pub struct GeojsonArgs {
    /// Dataset written by `export`.
    #[arg(long, short, env = "CYCLOTRIPS_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    pub input: PathBuf,

    /// GeoJSON file to write.
    #[arg(long, short, default_value = DEFAULT_GEOJSON_PATH)]
    pub output: PathBuf,

    /// Emit start/end points instead of route lines.
    #[arg(long)]
    pub points: bool,
}

impl GeojsonArgs {
    fn layout(&self) -> GeoJsonLayout {
        if self.points {
            GeoJsonLayout::Points
        } else {
            GeoJsonLayout::Routes
        }
    }
}

/// Runs the geojson command.
pub async fn run(args: &GeojsonArgs, cli: &Cli) -> Result<ExitCode> {
    let report = match convert(args).await {
        Ok(report) => report,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e}");
            }
            return Ok(ExitCode::for_failure(e.failure_kind()));
        }
    };

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&report)?),
        OutputFormat::Text if !cli.quiet => {
            println!("{}", TextFormatter::new(!cli.no_color).format_geojson(&report));
        }
        OutputFormat::Text => {}
    }
    Ok(ExitCode::Success)
}

async fn convert(args: &GeojsonArgs) -> Result<GeojsonReport, StoreError> {
    let dataset = read_dataset(&args.input).await?;
    let layout = args.layout();
    let summary = write_geojson(&dataset, layout, &args.output).await?;

    Ok(GeojsonReport {
        input: args.input.clone(),
        output: args.output.clone(),
        layout: layout.to_string(),
        trips: dataset.len(),
        features: summary.features,
        skipped: summary.skipped,
    })
}
