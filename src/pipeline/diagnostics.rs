//! Read-only comparisons between train, test and sampled data
//!
//! A `Diagnostics` borrows the orchestrator's current state, so it always
//! reflects the latest `fit`/`sample` call.

use std::collections::BTreeSet;

use serde::Serialize;

use super::binned::{BinKey, BinnedData};
use super::equivalence::{EquivalenceOutcome, EquivalenceTest};
use super::error::Result;

/// Row counts and shares of one bin combination across the three datasets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinComparison {
    pub key: BinKey,
    pub train: usize,
    pub test: usize,
    pub sample: usize,
    pub train_share: f64,
    pub sample_share: f64,
}

impl BinComparison {
    /// Sampled rows per train row in this bin.
    pub fn sample_to_train_ratio(&self) -> Option<f64> {
        (self.train > 0).then(|| self.sample as f64 / self.train as f64)
    }
}

/// Rows removed by min/max clipping before binning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClipCounts {
    pub train: usize,
    pub test: usize,
}

pub struct Diagnostics<'a> {
    train: &'a BinnedData,
    test: Option<&'a BinnedData>,
    sample: Option<&'a BinnedData>,
    equivalence: &'a dyn EquivalenceTest,
    clipped: ClipCounts,
}

impl<'a> Diagnostics<'a> {
    pub fn new(
        train: &'a BinnedData,
        test: Option<&'a BinnedData>,
        sample: Option<&'a BinnedData>,
        equivalence: &'a dyn EquivalenceTest,
        clipped: ClipCounts,
    ) -> Self {
        Self {
            train,
            test,
            sample,
            equivalence,
            clipped,
        }
    }

    /// Binned (non-outlier) train rows.
    pub fn n_train(&self) -> usize {
        self.train.n_binned()
    }

    pub fn n_test(&self) -> usize {
        self.test.map_or(0, BinnedData::n_binned)
    }

    pub fn n_sampled(&self) -> usize {
        self.sample.map_or(0, BinnedData::len)
    }

    pub fn clipped(&self) -> ClipCounts {
        self.clipped
    }

    /// Realized sample size relative to the train size.
    ///
    /// The denominator is [`Diagnostics::n_train`], the binned train rows.
    /// Outliers and rows clipped by the bounds are not counted.
    pub fn n_sampled_to_n_train_ratio(&self) -> f64 {
        match self.n_train() {
            0 => 0.0,
            n_train => self.n_sampled() as f64 / n_train as f64,
        }
    }

    /// Per-covariate equivalence between train and sample values.
    ///
    /// Without a sample every covariate fails.
    pub fn equivalence_report<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<EquivalenceOutcome>> {
        columns
            .iter()
            .map(|column| {
                let column = column.as_ref();
                let train = self.train.binned_values(column)?;
                let sample = match self.sample {
                    Some(sample) => sample.binned_values(column)?,
                    None => Vec::new(),
                };
                Ok(self.equivalence.compare(column, &train, &sample))
            })
            .collect()
    }

    /// True when every named covariate passes the equivalence test.
    pub fn equivalence_passed<S: AsRef<str>>(&self, columns: &[S]) -> Result<bool> {
        let report = self.equivalence_report(columns)?;
        for outcome in report.iter().filter(|o| !o.passed) {
            tracing::debug!(
                column = %outcome.column,
                test = self.equivalence.name(),
                statistic = ?outcome.statistic,
                p_value = ?outcome.p_value,
                "equivalence not reached"
            );
        }
        Ok(report.iter().all(|o| o.passed))
    }

    /// Bin-by-bin counts over every key seen in train or test.
    pub fn bin_comparison(&self) -> Vec<BinComparison> {
        let train_counts = self.train.bin_counts();
        let test_counts = self.test.map(BinnedData::bin_counts).unwrap_or_default();
        let sample_counts = self.sample.map(BinnedData::bin_counts).unwrap_or_default();

        let n_train: usize = train_counts.values().sum();
        let n_sample: usize = sample_counts.values().sum();
        let share = |count: usize, total: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };

        let keys: BTreeSet<&BinKey> = train_counts.keys().chain(test_counts.keys()).collect();
        keys.into_iter()
            .map(|key| {
                let train = train_counts.get(key).copied().unwrap_or(0);
                let sample = sample_counts.get(key).copied().unwrap_or(0);
                BinComparison {
                    key: key.clone(),
                    train,
                    test: test_counts.get(key).copied().unwrap_or(0),
                    sample,
                    train_share: share(train, n_train),
                    sample_share: share(sample, n_sample),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::binning::Binning;
    use crate::pipeline::equivalence::KsTest;
    use polars::prelude::*;

    fn labelled(values: &[f64]) -> BinnedData {
        let mut binning = Binning::new();
        binning.bin(&[0.0, 10.0], "x", 2, true).unwrap();
        BinnedData::new(df! { "x" => values }.unwrap(), &binning, 0).unwrap()
    }

    #[test]
    fn test_bin_comparison_covers_train_and_test_keys() {
        let train = labelled(&[1.0, 2.0, 3.0, 4.0]);
        let test = labelled(&[1.0, 2.0, 7.0, 8.0, 9.0]);
        let sample = labelled(&[1.0, 2.0]);
        let ks = KsTest::default();
        let diagnostics = Diagnostics::new(&train, Some(&test), Some(&sample), &ks, ClipCounts::default());

        let bins = diagnostics.bin_comparison();
        assert_eq!(bins.len(), 2);
        assert_eq!((bins[0].train, bins[0].test, bins[0].sample), (4, 2, 2));
        assert_eq!((bins[1].train, bins[1].test, bins[1].sample), (0, 3, 0));
        assert_eq!(bins[0].sample_share, 1.0);
        assert_eq!(bins[1].sample_to_train_ratio(), None);
        assert_eq!(diagnostics.n_sampled_to_n_train_ratio(), 0.5);
    }

    #[test]
    fn test_ratio_divides_by_binned_train_rows() {
        // two of six train rows fall outside the edges
        let train = labelled(&[1.0, 2.0, 7.0, 8.0, -1.0, 11.0]);
        let sample = labelled(&[1.0, 2.0, 3.0, 7.0, 8.0, 9.0, 6.0, 4.0]);
        let ks = KsTest::default();
        let diagnostics = Diagnostics::new(&train, None, Some(&sample), &ks, ClipCounts::default());

        assert_eq!(diagnostics.n_train(), 4);
        assert_eq!(diagnostics.n_sampled_to_n_train_ratio(), 2.0);
    }

    #[test]
    fn test_equivalence_fails_without_sample() {
        let train = labelled(&[1.0, 2.0, 3.0]);
        let ks = KsTest::default();
        let diagnostics = Diagnostics::new(&train, None, None, &ks, ClipCounts::default());

        assert_eq!(diagnostics.n_sampled(), 0);
        assert!(!diagnostics.equivalence_passed(&["x"]).unwrap());
        assert!(diagnostics.equivalence_report(&["missing"]).is_err());
    }
}
