#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line runner for the redlining overlay analysis.
//!
//! ```text
//! redlining run --config packages/cli/configs/los_angeles.toml [--output-dir <dir>]
//!               [--no-csv] [--no-charts]
//! redlining inspect <path> [--format geojson|csv] [--longitude <col>] [--latitude <col>]
//! ```
//!
//! Uses `indicatif-log-bridge` (via [`redlining_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod config;
mod inspect;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use redlining_layer_models::Crs;

use crate::config::RunConfig;
use crate::inspect::InputFormat;
use crate::pipeline::OutputOptions;

#[derive(Parser)]
#[command(
    name = "redlining",
    about = "Overlay HOLC redlining zones with EJScreen block groups and bird observations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis described by a TOML config
    Run {
        /// Path to the run configuration
        #[arg(long)]
        config: PathBuf,
        /// Overrides the configured output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Skip writing CSV files
        #[arg(long)]
        no_csv: bool,
        /// Skip printing bar charts
        #[arg(long)]
        no_charts: bool,
    },
    /// Print a summary of one layer file
    Inspect {
        /// `GeoJSON` or CSV file
        path: PathBuf,
        /// File format (guessed from the extension if omitted)
        #[arg(long, value_enum)]
        format: Option<InputFormat>,
        /// Longitude column for CSV input
        #[arg(long, default_value = "decimalLongitude")]
        longitude: String,
        /// Latitude column for CSV input
        #[arg(long, default_value = "decimalLatitude")]
        latitude: String,
        /// CRS override (e.g. EPSG:4269)
        #[arg(long)]
        crs: Option<Crs>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = redlining_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            no_csv,
            no_charts,
        } => {
            let config = RunConfig::load(&config)?;
            let options = OutputOptions {
                output_dir: output_dir.unwrap_or_else(|| config.output_dir.clone()),
                csv: !no_csv,
                charts: !no_charts,
            };
            pipeline::run(&config, &options, &multi)?;
        }
        Commands::Inspect {
            path,
            format,
            longitude,
            latitude,
            crs,
        } => {
            let source = inspect::source_for(&path, format, &longitude, &latitude, crs);
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("layer")
                .to_string();
            let layer = redlining_layer::load(&name, &source)?;
            print!("{}", inspect::describe(&layer));
        }
    }

    Ok(())
}
