use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;

mod config;
mod models;
mod staging;
mod analysis;
mod ingest;
mod output;
mod error;

use crate::analysis::{summary_rows, Analyzer};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "aki_detect")]
#[command(about = "Detect acute kidney injury episodes from serial creatinine readings")]
struct Cli {
    /// Lab CSV file, or a directory of CSV files (MRN, creatinine, date)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Optional demographics CSV (MRN, age, gender, race)
    #[arg(short, long)]
    demographics: Option<PathBuf>,

    /// Optional JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Baseline percentile, overrides the configuration file
    #[arg(short, long)]
    percentile: Option<f64>,

    /// AKI threshold as a multiple of baseline, overrides the configuration file
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Also print the summary table to stdout
    #[arg(long)]
    print: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    let config = config.with_overrides(cli.percentile, cli.threshold)?;

    let files = ingest::collect_input_files(&cli.input)
        .with_context(|| format!("Failed to list input files in {:?}", cli.input))?;
    info!("The following files are processed: {:?}", files);
    let labs = ingest::read_lab_files(&files).context("Failed to read lab files")?;

    let demographics = ingest::load_demographics(cli.demographics.as_deref());

    let analyzer = Analyzer::new(&config)?;
    let population = analyzer.analyze(labs, &demographics);
    info!(
        "Processed {} patients, and {} laboratory values",
        population.num_patients(),
        population.num_readings()
    );

    if cli.print {
        output::write_summary_table(&summary_rows(&population), std::io::stdout())?;
    }

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create output directory {:?}", cli.output))?;

    info!("Writing results to disk");
    output::save_results(&population, &cli.output)?;
    let params = analyzer.params();
    output::generate_report(
        &population,
        params.baseline_percentile,
        params.threshold_ratio,
        analyzer.equation_name(),
        &cli.output,
    )?;
    info!("Results saved to {:?}", cli.output);

    Ok(())
}
