//! eesampling: Stratified Sampling CLI Tool
//!
//! Draws a comparison sample from a test table whose binned covariate mix
//! matches a train table, then reports how closely the two agree.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eesampling::cli::Cli;
use eesampling::pipeline::{load_covariates, load_dataset, save_dataset, StratifiedSampling};
use eesampling::report::SamplingSummary;
use eesampling::utils::{
    create_spinner, finish_with_failure, finish_with_success, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_success,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "eesampling=debug"
    } else {
        "eesampling=warn"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let from_json = match &cli.columns_json {
        Some(path) => load_covariates(path)?,
        None => Vec::new(),
    };
    let covariates = cli.covariates(from_json)?;
    let output_path = cli.output_path();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&cli.train, &cli.test, &output_path, &covariates);

    // Step 1: Load both tables
    print_step_header(1, "Load Data");
    let spinner = create_spinner("Reading train and test tables...");
    let train = load_dataset(&cli.train, cli.infer_schema_length)?;
    let test = load_dataset(&cli.test, cli.infer_schema_length)?;
    finish_with_success(&spinner, "Tables loaded");
    print_count("train rows", train.height());
    print_count("test rows", test.height());

    let mut model = StratifiedSampling::new();
    for spec in covariates {
        model
            .add_column(spec)
            .context("Invalid covariate configuration")?;
    }

    // Step 2: Bin and sample
    print_step_header(2, "Stratified Sampling");
    let step_start = Instant::now();
    let spinner = create_spinner("Binning covariates and drawing sample...");
    let mut sample = match model.fit_and_sample(&train, &test, cli.options()) {
        Ok(sample) => {
            finish_with_success(&spinner, "Sample drawn");
            sample
        }
        Err(err) => {
            finish_with_failure(&spinner, "Sampling failed");
            print_info(&format!("Last bin counts: {}", model.n_bins_summary()));
            return Err(err).context("Stratified sampling failed");
        }
    };
    print_info(&format!("Bins: {}", model.n_bins_summary()));
    println!(
        "      {} {:.2}s",
        style("⏱").dim(),
        step_start.elapsed().as_secs_f64()
    );

    let summary = SamplingSummary::from_model(&model)?;
    if cli.verbose {
        summary.display_bins();
    }

    // Step 3: Save output
    print_step_header(3, "Save Results");
    let spinner = create_spinner("Writing output file...");
    save_dataset(&mut sample, &output_path)?;
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));
    print_success(&format!("{} rows written", sample.height()));

    summary.display();
    print_completion();

    Ok(())
}
