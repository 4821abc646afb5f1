//! Stratified sampling orchestrator
//!
//! `StratifiedSampling` owns the covariate configuration, fits bin edges on
//! the train population, samples the test population to match it and, for
//! auto-binned covariates, searches for a bin count that keeps the sample
//! equivalent to train without starving it of rows.

use polars::prelude::DataFrame;
use serde::Serialize;

use super::allocate::{allocate, draw_rows, AllocationPlan};
use super::binned::{take_rows, BinnedData};
use super::binning::Binning;
use super::covariate::{CovariateSet, CovariateSpec};
use super::diagnostics::{ClipCounts, Diagnostics};
use super::equivalence::{EquivalenceTest, KsTest};
use super::error::{Result, SamplingError};
use super::preprocess::{check_columns_present, chop_outliers, numeric_values, perturb};

/// Default sampled-to-train ratio floor used by auto-binning
pub const DEFAULT_MIN_RATIO: f64 = 4.0;

/// Default cap on auto-binning iterations per covariate
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Train bins smaller than this are ignored when matching
    pub min_n_train_per_bin: usize,
    pub random_seed: u64,
    /// Add seeded sub-epsilon noise to covariates before binning
    pub perturb: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_n_train_per_bin: 0,
            random_seed: 1,
            perturb: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOptions {
    /// Target sample size; `None` draws as many rows as proportions allow
    pub n_samples_approx: Option<usize>,
    pub random_seed: u64,
    /// Accept a smaller sample instead of failing when the pool runs short
    pub relax_n_samples_approx_constraint: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SampleOptions {
    pub fn new(n_samples_approx: Option<usize>) -> Self {
        Self {
            n_samples_approx,
            random_seed: 1,
            relax_n_samples_approx_constraint: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitAndSampleOptions {
    pub n_samples_approx: Option<usize>,
    pub min_n_train_per_bin: usize,
    pub random_seed: u64,
    /// Auto-binning backs off one bin when sampled/train falls below this;
    /// `None` or zero disables the floor
    pub min_n_sampled_to_n_train_ratio: Option<f64>,
    pub relax_n_samples_approx_constraint: bool,
    pub max_iterations: usize,
    pub perturb: bool,
}

impl Default for FitAndSampleOptions {
    fn default() -> Self {
        Self {
            n_samples_approx: None,
            min_n_train_per_bin: 0,
            random_seed: 1,
            min_n_sampled_to_n_train_ratio: Some(DEFAULT_MIN_RATIO),
            relax_n_samples_approx_constraint: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            perturb: true,
        }
    }
}

impl FitAndSampleOptions {
    fn fit(&self) -> FitOptions {
        FitOptions {
            min_n_train_per_bin: self.min_n_train_per_bin,
            random_seed: self.random_seed,
            perturb: self.perturb,
        }
    }

    fn sample(&self) -> SampleOptions {
        SampleOptions {
            n_samples_approx: self.n_samples_approx,
            random_seed: self.random_seed,
            relax_n_samples_approx_constraint: self.relax_n_samples_approx_constraint,
        }
    }

    fn ratio_floor(&self) -> Option<f64> {
        self.min_n_sampled_to_n_train_ratio.filter(|r| *r > 0.0)
    }
}

/// Why auto-binning stopped for a covariate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The sample became equivalent to train
    Equivalence,
    /// The sampled/train floor was hit; the previous bin count was kept
    RatioFloor,
    /// Neither equivalence nor a ratio floor constrains the column
    Unconstrained,
}

/// Result of auto-binning one covariate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoBinOutcome {
    pub column: String,
    pub n_bins: usize,
    pub iterations: usize,
    pub termination: Termination,
}

#[derive(Debug)]
struct FitState {
    covariates: CovariateSet,
    binning: Binning,
    data_train: BinnedData,
    perturb: bool,
    clipped: usize,
}

#[derive(Debug)]
struct SampleState {
    data_test: BinnedData,
    data_sample: BinnedData,
    plan: AllocationPlan,
    clipped: usize,
}

/// Stratified sampler matching a test population to a train population.
pub struct StratifiedSampling {
    covariates: CovariateSet,
    equivalence: Box<dyn EquivalenceTest>,
    fit: Option<FitState>,
    sample: Option<SampleState>,
    auto_bin_report: Vec<AutoBinOutcome>,
    n_samples_approx: Option<usize>,
}

impl Default for StratifiedSampling {
    fn default() -> Self {
        Self::new()
    }
}

impl StratifiedSampling {
    /// Create a sampler using the Kolmogorov-Smirnov equivalence test.
    pub fn new() -> Self {
        Self::with_equivalence_test(KsTest::default())
    }

    pub fn with_equivalence_test(test: impl EquivalenceTest + 'static) -> Self {
        Self {
            covariates: CovariateSet::new(),
            equivalence: Box::new(test),
            fit: None,
            sample: None,
            auto_bin_report: Vec::new(),
            n_samples_approx: None,
        }
    }

    /// Register or replace a covariate. Discards any fitted model.
    pub fn add_column(&mut self, spec: CovariateSpec) -> Result<&mut Self> {
        self.covariates.insert(spec)?;
        self.fit = None;
        self.sample = None;
        Ok(self)
    }

    pub fn columns(&self) -> &CovariateSet {
        &self.covariates
    }

    pub fn get_n_bins(&self, column: &str) -> Option<usize> {
        self.covariates.get(column).map(CovariateSpec::n_bins)
    }

    pub fn set_n_bins(&mut self, column: &str, n_bins: usize) -> Result<()> {
        self.covariates = self.covariates.with_n_bins(column, n_bins)?;
        Ok(())
    }

    /// Bin counts as `"X:3 bins,Y:1 bins"`.
    pub fn n_bins_summary(&self) -> String {
        self.covariates.summary()
    }

    pub fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }

    pub fn is_sampled(&self) -> bool {
        self.sample.is_some()
    }

    pub fn binning(&self) -> Option<&Binning> {
        self.fit.as_ref().map(|f| &f.binning)
    }

    pub fn data_train(&self) -> Option<&BinnedData> {
        self.fit.as_ref().map(|f| &f.data_train)
    }

    pub fn data_test(&self) -> Option<&BinnedData> {
        self.sample.as_ref().map(|s| &s.data_test)
    }

    pub fn data_sample(&self) -> Option<&BinnedData> {
        self.sample.as_ref().map(|s| &s.data_sample)
    }

    /// Quotas behind the most recent sample.
    pub fn allocation(&self) -> Option<&AllocationPlan> {
        self.sample.as_ref().map(|s| &s.plan)
    }

    pub fn auto_bin_report(&self) -> &[AutoBinOutcome] {
        &self.auto_bin_report
    }

    /// Sample size requested by the last `fit_and_sample`.
    pub fn n_samples_approx(&self) -> Option<usize> {
        self.n_samples_approx
    }

    /// Fit bin edges on the train population.
    pub fn fit(&mut self, train: &DataFrame, options: FitOptions) -> Result<()> {
        let covariates = self.covariates.clone();
        self.fit_covariates(covariates, train, options)
    }

    fn fit_covariates(
        &mut self,
        covariates: CovariateSet,
        train: &DataFrame,
        options: FitOptions,
    ) -> Result<()> {
        self.fit = None;
        self.sample = None;
        check_columns_present(train, &covariates)?;

        let (clipped_df, clipped) = chop_outliers(train, &covariates)?;
        if clipped > 0 {
            tracing::warn!(rows = clipped, "dropped train rows outside allowed bounds");
        }
        let df = if options.perturb {
            perturb(&clipped_df, &covariates.names(), options.random_seed)?
        } else {
            clipped_df
        };

        let mut binning = Binning::new();
        for spec in covariates.iter() {
            let values: Vec<f64> = numeric_values(&df, &spec.name)?
                .into_iter()
                .flatten()
                .collect();
            binning.bin(&values, &spec.name, spec.n_bins(), spec.fixed_width)?;
        }

        let data_train = BinnedData::new(df, &binning, options.min_n_train_per_bin)?;
        self.fit = Some(FitState {
            covariates,
            binning,
            data_train,
            perturb: options.perturb,
            clipped,
        });
        Ok(())
    }

    /// Draw a sample of `test` matching the fitted train composition.
    ///
    /// The returned frame holds the selected test rows with their original
    /// (unperturbed) values; the binned view is available from `data_sample`.
    pub fn sample(&mut self, test: &DataFrame, options: SampleOptions) -> Result<DataFrame> {
        self.sample = None;
        let fit = self.fit.as_ref().ok_or(SamplingError::NotFitted)?;
        check_columns_present(test, &fit.covariates)?;

        let (clipped_df, clipped) = chop_outliers(test, &fit.covariates)?;
        if clipped > 0 {
            tracing::warn!(rows = clipped, "dropped test rows outside allowed bounds");
        }
        let df = if fit.perturb {
            perturb(&clipped_df, &fit.covariates.names(), options.random_seed)?
        } else {
            clipped_df.clone()
        };

        let data_test = BinnedData::new(df, &fit.binning, 0)?;
        let plan = allocate(
            &fit.data_train,
            &data_test,
            options.n_samples_approx,
            options.relax_n_samples_approx_constraint,
        )?;
        let rows = draw_rows(&data_test, &plan, options.random_seed);

        let data_sample = BinnedData::new(take_rows(data_test.df(), &rows)?, &fit.binning, 0)?;
        let sampled = take_rows(&clipped_df, &rows)?;

        self.sample = Some(SampleState {
            data_test,
            data_sample,
            plan,
            clipped,
        });
        Ok(sampled)
    }

    /// Read-only view over the current fit and sample.
    pub fn diagnostics(&self) -> Result<Diagnostics<'_>> {
        let fit = self.fit.as_ref().ok_or(SamplingError::NotFitted)?;
        Ok(Diagnostics::new(
            &fit.data_train,
            self.data_test(),
            self.data_sample(),
            self.equivalence.as_ref(),
            ClipCounts {
                train: fit.clipped,
                test: self.sample.as_ref().map_or(0, |s| s.clipped),
            },
        ))
    }

    /// Whether the current sample falls below the sampled/train ratio floor.
    fn violates_ratio(&self, column: &str, floor: Option<f64>) -> Result<bool> {
        let Some(floor) = floor else {
            return Ok(false);
        };
        let ratio = self.diagnostics()?.n_sampled_to_n_train_ratio();
        if ratio < floor {
            tracing::info!(
                "Insufficient test data in one of the bins for {}: found {:.2}:1 but need {}:1. Using last successful n_bins.",
                column,
                ratio,
                floor
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Tune every auto-binned covariate, then fit and sample with the result.
    ///
    /// Covariates are tuned one at a time in registration order; a tuned
    /// covariate keeps its settled bin count while later ones are searched.
    /// On failure the covariate set is left as it stood when the search
    /// stopped.
    ///
    /// An auto-binned covariate that needs no equivalence while the ratio
    /// floor is disabled is left at its current bin count, one for a fresh
    /// `None` spec.
    pub fn fit_and_sample(
        &mut self,
        train: &DataFrame,
        test: &DataFrame,
        options: FitAndSampleOptions,
    ) -> Result<DataFrame> {
        if self.covariates.is_empty() {
            return Err(SamplingError::NoColumns);
        }
        self.auto_bin_report.clear();
        self.n_samples_approx = options.n_samples_approx;

        let auto_columns: Vec<String> = self
            .covariates
            .iter()
            .filter(|s| s.is_auto())
            .map(|s| s.name.clone())
            .collect();

        let mut covariates = self.covariates.clone();
        for column in &auto_columns {
            match self.auto_bin(covariates.clone(), column, train, test, &options) {
                Ok((settled, outcome)) => {
                    tracing::info!(
                        column = %outcome.column,
                        n_bins = outcome.n_bins,
                        iterations = outcome.iterations,
                        termination = ?outcome.termination,
                        "auto-binning settled"
                    );
                    covariates = settled;
                    self.auto_bin_report.push(outcome);
                }
                Err((last, err)) => {
                    self.covariates = last;
                    return Err(err);
                }
            }
        }
        self.covariates = covariates;

        self.fit(train, options.fit())?;
        self.sample(test, options.sample())
    }

    /// Search the bin count of a single covariate.
    ///
    /// Errors carry the covariate set of the failing iteration.
    fn auto_bin(
        &mut self,
        mut covariates: CovariateSet,
        column: &str,
        train: &DataFrame,
        test: &DataFrame,
        options: &FitAndSampleOptions,
    ) -> std::result::Result<(CovariateSet, AutoBinOutcome), (CovariateSet, SamplingError)> {
        let floor = options.ratio_floor();
        let Some(spec) = covariates.get(column).cloned() else {
            let err = SamplingError::Configuration(format!("unknown column '{}'", column));
            return Err((covariates, err));
        };

        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > options.max_iterations {
                let err = SamplingError::Convergence {
                    column: column.to_string(),
                    reason: format!("no settled bin count after {} iterations", options.max_iterations),
                };
                return Err((covariates, err));
            }
            tracing::info!("Computing bins: {}", covariates.summary());

            let step = self.auto_bin_step(&covariates, column, &spec, train, test, options, floor);
            let n_bins = covariates.get(column).map_or(1, CovariateSpec::n_bins);
            let decision = match step {
                Ok(decision) => decision,
                Err(err) => return Err((covariates, err)),
            };

            let (next_n_bins, termination) = match decision {
                Step::Grow => {
                    let max_bins = self.data_train().map_or(0, BinnedData::n_binned).max(1);
                    if n_bins + 1 > max_bins {
                        let err = SamplingError::Convergence {
                            column: column.to_string(),
                            reason: format!(
                                "bin count would exceed the {} binned train rows",
                                max_bins
                            ),
                        };
                        return Err((covariates, err));
                    }
                    (n_bins + 1, None)
                }
                Step::Stop(Termination::RatioFloor) => {
                    ((n_bins - 1).max(1), Some(Termination::RatioFloor))
                }
                Step::Stop(termination) => (n_bins, Some(termination)),
            };

            covariates = match covariates.with_n_bins(column, next_n_bins) {
                Ok(next) => next,
                Err(err) => return Err((covariates, err)),
            };

            if let Some(termination) = termination {
                let outcome = AutoBinOutcome {
                    column: column.to_string(),
                    n_bins: next_n_bins,
                    iterations,
                    termination,
                };
                return Ok((covariates, outcome));
            }
        }
    }

    /// Fit and sample once with `covariates` and decide what to do next.
    #[allow(clippy::too_many_arguments)]
    fn auto_bin_step(
        &mut self,
        covariates: &CovariateSet,
        column: &str,
        spec: &CovariateSpec,
        train: &DataFrame,
        test: &DataFrame,
        options: &FitAndSampleOptions,
        floor: Option<f64>,
    ) -> Result<Step> {
        self.fit_covariates(covariates.clone(), train, options.fit())?;
        self.sample(test, options.sample())?;

        if spec.auto_bin_require_equivalence {
            if self.data_sample().map_or(true, BinnedData::is_empty) {
                return Err(SamplingError::Convergence {
                    column: column.to_string(),
                    reason: "Too many bin divisions before finding equivalence (usually occurs when several stratification params are used)".to_string(),
                });
            }
            if !self.diagnostics()?.equivalence_passed(&[column])? {
                return Ok(Step::Grow);
            }
            if self.violates_ratio(column, floor)? {
                return Ok(Step::Stop(Termination::RatioFloor));
            }
            Ok(Step::Stop(Termination::Equivalence))
        } else if self.violates_ratio(column, floor)? {
            Ok(Step::Stop(Termination::RatioFloor))
        } else if floor.is_none() {
            Ok(Step::Stop(Termination::Unconstrained))
        } else {
            Ok(Step::Grow)
        }
    }
}

/// Decision taken after one auto-binning iteration.
enum Step {
    Grow,
    Stop(Termination),
}
