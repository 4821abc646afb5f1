//! Command-line argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{CovariateSpec, FitAndSampleOptions};

/// eesampling - Draw a comparison sample whose covariate bins match a treatment group
#[derive(Parser, Debug)]
#[command(name = "eesampling")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Train (treatment) table, CSV or Parquet
    #[arg(long)]
    pub train: PathBuf,

    /// Test (comparison pool) table to sample from, CSV or Parquet
    #[arg(long)]
    pub test: PathBuf,

    /// Covariate to stratify on, as NAME or NAME:BINS.
    /// Omitting BINS (or BINS=auto) enables auto-binning. Repeatable.
    #[arg(short, long = "column", value_parser = parse_column)]
    pub columns: Vec<ColumnArg>,

    /// JSON file with an array of covariate specs, applied before --column
    #[arg(long)]
    pub columns_json: Option<PathBuf>,

    /// Allowed value range for a covariate, as NAME=LO..HI (either side may be empty).
    /// Rows outside the range are clipped before binning. Repeatable.
    #[arg(long = "bounds", value_parser = parse_bounds)]
    pub bounds: Vec<BoundsArg>,

    /// Use equal-frequency (quantile) bins for this covariate. Repeatable.
    #[arg(long = "quantile")]
    pub quantile: Vec<String>,

    /// Do not require equivalence when auto-binning this covariate. Repeatable.
    #[arg(long = "no-equivalence")]
    pub no_equivalence: Vec<String>,

    /// Approximate sample size. Defaults to the largest proportional sample.
    #[arg(short = 'n', long)]
    pub n_samples: Option<usize>,

    /// Accept a smaller sample when the pool cannot supply --n-samples
    #[arg(long, default_value = "false")]
    pub relax: bool,

    /// Train bins with fewer rows are ignored when matching
    #[arg(long, default_value = "0")]
    pub min_n_train_per_bin: usize,

    /// Minimum sampled-to-train ratio kept by auto-binning (0 disables)
    #[arg(long, default_value = "4")]
    pub min_ratio: f64,

    /// Maximum auto-binning iterations per covariate
    #[arg(long, default_value = "100")]
    pub max_iterations: usize,

    /// Random seed for perturbation and sampling
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// Output file path (CSV or Parquet, determined by extension).
    /// Defaults to the test file's directory with a '_sample' suffix.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of rows to use for schema inference (CSV only). Use 0 for a full scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Enable debug logging
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

/// A `--column` value.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnArg {
    pub name: String,
    /// `None` selects auto-binning
    pub n_bins: Option<usize>,
}

/// A `--bounds` value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsArg {
    pub name: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Cli {
    /// Output path, derived from the test path if not explicitly provided.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let parent = self.test.parent().unwrap_or_else(|| std::path::Path::new("."));
            let stem = self
                .test
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            let extension = self
                .test
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("parquet");
            parent.join(format!("{}_sample.{}", stem, extension))
        })
    }

    /// Merge JSON specs, --column entries and per-column flags into specs.
    pub fn covariates(&self, from_json: Vec<CovariateSpec>) -> anyhow::Result<Vec<CovariateSpec>> {
        let mut specs = from_json;
        for column in &self.columns {
            let spec = CovariateSpec::new(column.name.clone(), column.n_bins);
            match specs.iter_mut().find(|s| s.name == column.name) {
                Some(existing) => *existing = spec,
                None => specs.push(spec),
            }
        }

        let find = |name: &str, flag: &str| -> anyhow::Result<usize> {
            specs
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| anyhow::anyhow!("{} refers to unknown column '{}'", flag, name))
        };
        let bounds = self
            .bounds
            .iter()
            .map(|b| find(&b.name, "--bounds").map(|idx| (idx, b)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let quantile = self
            .quantile
            .iter()
            .map(|name| find(name, "--quantile"))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let no_equivalence = self
            .no_equivalence
            .iter()
            .map(|name| find(name, "--no-equivalence"))
            .collect::<anyhow::Result<Vec<_>>>()?;

        for (idx, b) in bounds {
            specs[idx].min_value_allowed = b.min;
            specs[idx].max_value_allowed = b.max;
        }
        for idx in quantile {
            specs[idx].fixed_width = false;
        }
        for idx in no_equivalence {
            specs[idx].auto_bin_require_equivalence = false;
        }

        if specs.is_empty() {
            anyhow::bail!("At least one covariate is required. Use -c/--column or --columns-json.");
        }
        Ok(specs)
    }

    pub fn options(&self) -> FitAndSampleOptions {
        FitAndSampleOptions {
            n_samples_approx: self.n_samples,
            min_n_train_per_bin: self.min_n_train_per_bin,
            random_seed: self.seed,
            min_n_sampled_to_n_train_ratio: Some(self.min_ratio),
            relax_n_samples_approx_constraint: self.relax,
            max_iterations: self.max_iterations,
            ..Default::default()
        }
    }
}

/// Parse `NAME`, `NAME:auto` or `NAME:BINS`
fn parse_column(s: &str) -> Result<ColumnArg, String> {
    let (name, bins) = match s.split_once(':') {
        Some((name, bins)) => (name, Some(bins)),
        None => (s, None),
    };
    if name.is_empty() {
        return Err(format!("'{}' has an empty column name", s));
    }
    let n_bins = match bins {
        None | Some("auto") => None,
        Some(bins) => {
            let n: usize = bins
                .parse()
                .map_err(|_| format!("'{}' is not a valid bin count", bins))?;
            if n == 0 {
                return Err(format!("column '{}' needs at least one bin", name));
            }
            Some(n)
        }
    };
    Ok(ColumnArg {
        name: name.to_string(),
        n_bins,
    })
}

/// Parse `NAME=LO..HI`, `NAME=LO..` or `NAME=..HI`
fn parse_bounds(s: &str) -> Result<BoundsArg, String> {
    let (name, range) = s
        .split_once('=')
        .ok_or_else(|| format!("'{}' must look like NAME=LO..HI", s))?;
    let (lo, hi) = range
        .split_once("..")
        .ok_or_else(|| format!("'{}' must look like NAME=LO..HI", s))?;

    let parse = |v: &str| -> Result<Option<f64>, String> {
        if v.is_empty() {
            Ok(None)
        } else {
            v.parse()
                .map(Some)
                .map_err(|_| format!("'{}' is not a valid number", v))
        }
    };
    let (min, max) = (parse(lo)?, parse(hi)?);
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(format!("lower bound {} is above upper bound {}", min, max));
        }
    }
    Ok(BoundsArg {
        name: name.to_string(),
        min,
        max,
    })
}
