//! # echem-summary
//!
//! Summarise one cycle of a battery cycler export.
//!
//! ```bash
//! echem-summary run.xlsx
//! echem-summary run.csv --cycle 2 --params params.json --curves curves.parquet
//! ```

mod export;

use std::path::PathBuf;

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use log::info;

use echem_summary::{extract_features, SummaryOptions};

/// Extract ICE, charge capacity and plateau capacities from a cycler export
#[derive(Parser)]
#[command(name = "echem-summary")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cycler export (.csv, .xlsx or .xls)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Full cycle to summarise (overrides the params file)
    #[arg(short, long)]
    cycle: Option<u32>,

    /// Swap charge and discharge labels (cells run in reverse polarity)
    #[arg(long)]
    invert: bool,

    /// JSON file with summary options and smoothing parameters
    #[arg(short, long, value_name = "JSON")]
    params: Option<PathBuf>,

    /// Write the cleaned curves and plateau markers to a Parquet file
    #[arg(long, value_name = "PARQUET")]
    curves: Option<PathBuf>,

    /// Print the full summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut options = match &cli.params {
        Some(path) => SummaryOptions::from_json_file(path)
            .with_context(|| format!("reading parameters from {}", path.display()))?,
        None => SummaryOptions::default(),
    };
    if let Some(cycle) = cli.cycle {
        options.cycle_no = cycle;
    }
    options.invert |= cli.invert;

    let summary = extract_features(&cli.input, &options)
        .with_context(|| format!("summarising {}", cli.input.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let table = export::summary_batch(&summary)?;
        println!("Cycle {}", summary.cycle_no);
        println!("{}", pretty_format_batches(&[table])?);
    }

    if let Some(path) = &cli.curves {
        let rows = export::write_curves(&summary, path)?;
        info!("wrote {rows} curve points to {}", path.display());
    }

    Ok(())
}
