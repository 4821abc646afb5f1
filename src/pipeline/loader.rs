//! Table and covariate-file I/O for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use super::covariate::CovariateSpec;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a table from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    // 0 means full table scan
    let schema_length = (infer_schema_length > 0).then_some(infer_schema_length);

    let lf = match extension_of(path).as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        other => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            other
        ),
    };

    lf.collect()
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Save a table to a file (CSV or Parquet based on extension)
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let create = || {
        std::fs::File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))
    };

    match extension_of(path).as_str() {
        "csv" => {
            let mut file = create()?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            ParquetWriter::new(create()?)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        other => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            other
        ),
    }

    Ok(())
}

/// Read covariate specs from a JSON array, e.g.
/// `[{"name": "usage", "n_bins": null, "min_value_allowed": 0}]`.
pub fn load_covariates(path: &Path) -> Result<Vec<CovariateSpec>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read column file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid column file: {}", path.display()))
}
