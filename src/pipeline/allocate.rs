//! Proportional, capacity-constrained allocation of test rows to bins
//!
//! Train bin shares fix the composition of the sample; test bin sizes cap how
//! many rows each bin can contribute. Draws inside a bin are without
//! replacement from a seeded generator, so a seed fully determines the sample.

use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::binned::{take_rows, BinKey, BinnedData};
use super::error::{Result, SamplingError, Undersupplied};

/// Quota for a single bin combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinQuota {
    pub key: BinKey,
    pub train_count: usize,
    pub test_count: usize,
    /// Rounded proportional target before the capacity cap
    pub target: usize,
    /// Rows actually drawn, `min(target, test_count)`
    pub draw: usize,
}

/// Per-bin quotas for one sampling request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    pub quotas: Vec<BinQuota>,
    /// Eligible train rows the shares are computed against
    pub n_train_eligible: usize,
    /// Largest total the test pool supports at exact train proportions
    pub capacity: usize,
    /// Total the quotas were scaled to
    pub target_total: usize,
}

impl AllocationPlan {
    pub fn total_draw(&self) -> usize {
        self.quotas.iter().map(|q| q.draw).sum()
    }

    /// Train bins with no test rows to draw from.
    pub fn unmatched(&self) -> impl Iterator<Item = &BinQuota> {
        self.quotas.iter().filter(|q| q.test_count == 0)
    }
}

/// Compute per-bin quotas matching the train composition.
///
/// Without `n_samples_approx` the plan draws as many rows as the scarcest bin
/// allows. With it, quotas are `round(p_k * n)`; a bin short of its quota is an
/// [`SamplingError::InsufficientSamples`] unless `relax` is set, in which case
/// each bin draws what it can and the realized total falls short of `n`.
pub fn allocate(
    train: &BinnedData,
    test: &BinnedData,
    n_samples_approx: Option<usize>,
    relax: bool,
) -> Result<AllocationPlan> {
    let train_counts = train.eligible_counts();
    let n_train_eligible: usize = train_counts.values().sum();
    if n_train_eligible == 0 {
        return Err(SamplingError::NoEligibleTrainBins);
    }

    // floor(test_k / p_k) for the tightest bin
    let capacity = train_counts
        .iter()
        .map(|(key, &n_train)| test.count(key) * n_train_eligible / n_train)
        .min()
        .unwrap_or(0);

    let target_total = match n_samples_approx {
        None => capacity,
        Some(n) => n,
    };

    let quotas: Vec<BinQuota> = train_counts
        .into_iter()
        .map(|(key, train_count)| {
            let share = train_count as f64 / n_train_eligible as f64;
            let target = (share * target_total as f64).round() as usize;
            let test_count = test.count(&key);
            BinQuota {
                key,
                train_count,
                test_count,
                target,
                draw: target.min(test_count),
            }
        })
        .collect();

    if let (Some(requested), false) = (n_samples_approx, relax) {
        let undersupplied: Vec<Undersupplied> = quotas
            .iter()
            .filter(|q| q.target > q.test_count)
            .map(|q| Undersupplied {
                key: q.key.clone(),
                target: q.target,
                available: q.test_count,
            })
            .collect();
        if !undersupplied.is_empty() {
            return Err(SamplingError::InsufficientSamples {
                requested,
                undersupplied,
            });
        }
    }

    let plan = AllocationPlan {
        quotas,
        n_train_eligible,
        capacity,
        target_total,
    };
    tracing::debug!(
        bins = plan.quotas.len(),
        capacity = plan.capacity,
        target = plan.target_total,
        drawn = plan.total_draw(),
        unmatched = plan.unmatched().count(),
        "allocated sample quotas"
    );
    Ok(plan)
}

/// Choose test row positions for a plan, bin by bin in key order.
pub fn draw_rows(test: &BinnedData, plan: &AllocationPlan, random_seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(random_seed);
    let mut chosen = Vec::with_capacity(plan.total_draw());

    for quota in plan.quotas.iter().filter(|q| q.draw > 0) {
        let mut rows = test.rows_in_bin(&quota.key).to_vec();
        rows.shuffle(&mut rng);
        rows.truncate(quota.draw);
        rows.sort_unstable();
        chosen.extend(rows);
    }
    chosen
}

/// Draw a stratified sample of `test` matching the bin composition of `train`.
pub fn sample_bins(
    train: &BinnedData,
    test: &BinnedData,
    n_samples_approx: Option<usize>,
    relax_n_samples_approx_constraint: bool,
    random_seed: u64,
) -> Result<DataFrame> {
    let plan = allocate(train, test, n_samples_approx, relax_n_samples_approx_constraint)?;
    take_rows(test.df(), &draw_rows(test, &plan, random_seed))
}
