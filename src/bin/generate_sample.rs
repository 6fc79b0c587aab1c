use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use echem_summary::synthetic::{CycleProfile, SyntheticCycler};

/// Write a synthetic multi-cycle cycler export as CSV
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output CSV path
    #[arg(value_name = "OUTPUT", default_value = "sample_cycler.csv")]
    output: PathBuf,

    /// Number of full cycles
    #[arg(short, long, default_value = "3")]
    cycles: u32,

    /// PRNG seed for the dQ/dV noise
    #[arg(short, long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let profile = CycleProfile::default();
    let per_cycle = 2 * (profile.points_per_half_cycle + profile.rest_points);
    let cycler = SyntheticCycler::new(profile, args.cycles);

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    cycler
        .write_csv(args.seed, std::io::BufWriter::new(file))
        .context("writing sample CSV")?;

    println!(
        "Wrote {} cycles ({} rows each) to {}",
        args.cycles,
        per_cycle,
        args.output.display()
    );
    Ok(())
}
