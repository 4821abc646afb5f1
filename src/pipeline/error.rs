//! Error types for stratified sampling.
//!
//! Every failure is returned synchronously to the caller. The orchestrator
//! keeps its partially tuned state after an error so it can be inspected.

use polars::prelude::PolarsError;
use thiserror::Error;

use super::binned::BinKey;

/// Errors raised while configuring, fitting, sampling or auto-binning.
#[derive(Error, Debug)]
pub enum SamplingError {
    /// No covariates were registered before fitting.
    #[error("No columns found in model. Use add_column(...) to add a column.")]
    NoColumns,

    /// An input table lacks one or more registered covariates.
    #[error("data is missing required columns: {}", .0.join(","))]
    MissingColumns(Vec<String>),

    /// A covariate spec or option is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Bin edges could not be computed for a column.
    #[error("cannot bin column '{column}': {reason}")]
    Binning { column: String, reason: String },

    /// `sample` was called before a successful `fit`.
    #[error("No model found; please run fit()")]
    NotFitted,

    /// Every train row is an outlier or sits in a bin below the size floor.
    #[error("no eligible train bins to match against (all rows are outliers or in undersized bins)")]
    NoEligibleTrainBins,

    /// The strict sample-size target cannot be met by the test pool.
    #[error(
        "not enough test rows to reach {requested} samples; {} bin(s) undersupplied",
        .undersupplied.len()
    )]
    InsufficientSamples {
        requested: usize,
        undersupplied: Vec<Undersupplied>,
    },

    /// Auto-binning could not settle on a bin count.
    #[error("auto-binning failed for '{column}': {reason}")]
    Convergence { column: String, reason: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// A bin whose test availability falls short of its target draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undersupplied {
    pub key: BinKey,
    pub target: usize,
    pub available: usize,
}

pub type Result<T> = std::result::Result<T, SamplingError>;
