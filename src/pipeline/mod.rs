//! Pipeline module - clipping, binning, allocation and the auto-binning loop

pub mod allocate;
pub mod binned;
pub mod binning;
pub mod covariate;
pub mod diagnostics;
pub mod equivalence;
pub mod error;
pub mod loader;
pub mod model;
pub mod preprocess;

pub use allocate::{allocate, draw_rows, sample_bins, AllocationPlan, BinQuota};
pub use binned::{BinKey, BinnedData};
pub use binning::{bin, BinEdges, Binning};
pub use covariate::{BinCount, CovariateConfig, CovariateSet, CovariateSpec};
pub use diagnostics::{BinComparison, ClipCounts, Diagnostics};
pub use equivalence::{ks_two_sample, EquivalenceOutcome, EquivalenceTest, KsTest};
pub use error::{Result, SamplingError, Undersupplied};
pub use loader::*;
pub use model::{
    AutoBinOutcome, FitAndSampleOptions, FitOptions, SampleOptions, StratifiedSampling,
    Termination,
};
pub use preprocess::{check_columns_present, chop_outliers, perturb};
