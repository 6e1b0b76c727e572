//! CLI entry point for the transactions analysis pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use estatelens::{run, AnalysisPaths};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Descriptive analysis of real-estate transactions")]
struct Args {
    /// Path to the properties table
    #[arg(default_value = "data/properties.csv")]
    properties: PathBuf,

    /// Path to the customers table
    #[arg(default_value = "data/customers.csv")]
    customers: PathBuf,

    /// Directory for charts, exported tables and the run summary
    #[arg(default_value = "out")]
    out_dir: PathBuf,
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let paths = AnalysisPaths::new(&args.properties, &args.customers, &args.out_dir);
    let summary = run(&paths).context("analysis failed")?;

    println!();
    for line in &summary.highlights {
        println!("{line}");
    }
    println!(
        "\n{} charts and {} files written to {}",
        summary.charts.len(),
        summary.exports.len(),
        args.out_dir.display()
    );
    Ok(())
}
