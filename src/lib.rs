//! eesampling: Stratified Sampling Library
//!
//! Draws a sample from a comparison pool whose binned covariate composition
//! mirrors a treatment group, tuning bin counts until the sample is
//! distributionally equivalent to the treatment group.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use pipeline::{CovariateSpec, FitAndSampleOptions, SamplingError, StratifiedSampling};
