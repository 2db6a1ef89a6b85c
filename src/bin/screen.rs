use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use canna_screen::export::{read_notations_csv, write_derivatives_csv, write_results_csv};
use canna_screen::*;
use clap::Parser;
use tracing::warn;

/// Screen SMILES structures for drug-likeness. ADMET columns are heuristic
/// labels, not predictions.
#[derive(Parser)]
#[command(name = "screen")]
struct Cli {
    /// CSV with a `smiles` column, or SMILES in the first column
    input: PathBuf,
    /// Where to write one result row per input structure
    output: PathBuf,
    /// Write a DOT depiction per structure into this directory
    #[arg(long)]
    images: Option<PathBuf>,
    /// Also render each depiction to PNG with Graphviz
    #[arg(long)]
    png: bool,
    /// Seconds allowed for one PNG render
    #[arg(long, default_value_t = 10)]
    render_timeout: u64,
    /// Write proposed derivatives of every input structure to this CSV
    #[arg(long)]
    derivatives: Option<PathBuf>,
    /// Screen the distinct derivatives too and write their results here
    #[arg(long)]
    derivative_results: Option<PathBuf>,
    /// Inclusive chain length edits, e.g. -3..3
    #[arg(long, default_value = "-3..3", allow_hyphen_values = true)]
    delta: ChainDelta,
    /// Shortest terminal chain that counts as a side chain
    #[arg(long, default_value_t = 3)]
    min_chain_length: usize,
}

fn main() -> Result<()> {
    init_logging(&std::env::var("SCREEN_LOG").unwrap_or_else(|_| "info".to_string()));
    let cli = Cli::parse();

    let notations = read_notations_csv(&cli.input)?;

    let mut config = ScreeningConfig::default();
    match &cli.images {
        Some(dir) => {
            config = config.with_depiction(
                DepictionOptions::new(dir)
                    .with_png(cli.png)
                    .with_timeout(Duration::from_secs(cli.render_timeout)),
            )
        }
        None if cli.png => warn!("--png has no effect without --images"),
        None => {}
    }

    let entries = analyse_many(&notations, &config).context("screening aborted")?;
    write_results_csv(&cli.output, &entries, &config)?;
    println!("{}", BatchSummary::from_entries(&entries));

    if cli.derivatives.is_some() || cli.derivative_results.is_some() {
        let delta = cli.delta.with_min_chain_length(cli.min_chain_length);
        let family = propose_family(&notations, &delta);
        if let Some(path) = &cli.derivatives {
            write_derivatives_csv(path, &family)?;
        }
        if let Some(path) = &cli.derivative_results {
            let derivatives = distinct_derivatives(&family);
            // Keep derivative pictures apart from the parents' numbering.
            let config = match config.depiction.clone() {
                Some(mut options) => {
                    options.directory = options.directory.join("derivatives");
                    config.clone().with_depiction(options)
                }
                None => config.clone(),
            };
            let entries = analyse_many(&derivatives, &config).context("derivative screening aborted")?;
            write_results_csv(path, &entries, &config)?;
            println!("derivatives: {}", BatchSummary::from_entries(&entries));
        }
    }

    Ok(())
}
