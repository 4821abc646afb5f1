//! Binned view of a dataset
//!
//! Every row gets a bin-combination key: the tuple of its per-covariate bin
//! indices. Rows that cannot be binned (null or outside the fitted edges) are
//! flagged as outliers. They stay in the underlying frame but are left out of
//! every bin statistic. Configured min/max bounds are applied earlier, on the
//! raw values, when out-of-bound rows are clipped.

use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::*;
use serde::Serialize;

use super::binning::Binning;
use super::error::Result;
use super::preprocess::numeric_values;

/// Per-covariate bin indices identifying one stratification cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BinKey(pub Vec<usize>);

impl fmt::Display for BinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// A dataset labelled with bin-combination keys.
#[derive(Debug, Clone)]
pub struct BinnedData {
    df: DataFrame,
    /// `None` marks an outlier row
    keys: Vec<Option<BinKey>>,
    rows_by_bin: BTreeMap<BinKey, Vec<usize>>,
    min_n_per_bin: usize,
}

impl BinnedData {
    /// Label `df` with `binning`, which may have been fitted on another dataset.
    ///
    /// Bins holding fewer than `min_n_per_bin` rows are kept in the counts but
    /// reported as ineligible by [`BinnedData::eligible_counts`].
    pub fn new(df: DataFrame, binning: &Binning, min_n_per_bin: usize) -> Result<Self> {
        let height = df.height();
        let mut indices: Vec<Vec<usize>> = vec![Vec::with_capacity(binning.columns().len()); height];
        let mut outlier = vec![false; height];

        for edges in binning.columns() {
            for (row, value) in numeric_values(&df, &edges.column)?.into_iter().enumerate() {
                match value.and_then(|v| edges.assign(v)) {
                    Some(i) => indices[row].push(i),
                    None => outlier[row] = true,
                }
            }
        }

        let mut rows_by_bin: BTreeMap<BinKey, Vec<usize>> = BTreeMap::new();
        let keys: Vec<Option<BinKey>> = indices
            .into_iter()
            .zip(outlier)
            .enumerate()
            .map(|(row, (idx, is_outlier))| {
                if is_outlier {
                    return None;
                }
                let key = BinKey(idx);
                rows_by_bin.entry(key.clone()).or_default().push(row);
                Some(key)
            })
            .collect();

        Ok(Self {
            df,
            keys,
            rows_by_bin,
            min_n_per_bin,
        })
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    /// Total rows, outliers included.
    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn key(&self, row: usize) -> Option<&BinKey> {
        self.keys.get(row).and_then(Option::as_ref)
    }

    pub fn is_outlier(&self, row: usize) -> bool {
        self.key(row).is_none()
    }

    pub fn n_outliers(&self) -> usize {
        self.keys.iter().filter(|k| k.is_none()).count()
    }

    /// Rows that received a bin key.
    pub fn n_binned(&self) -> usize {
        self.len() - self.n_outliers()
    }

    /// Row count per bin combination, outliers excluded.
    pub fn bin_counts(&self) -> BTreeMap<BinKey, usize> {
        self.rows_by_bin
            .iter()
            .map(|(key, rows)| (key.clone(), rows.len()))
            .collect()
    }

    /// Row counts of bins meeting the minimum-size floor.
    pub fn eligible_counts(&self) -> BTreeMap<BinKey, usize> {
        self.rows_by_bin
            .iter()
            .filter(|(_, rows)| rows.len() >= self.min_n_per_bin.max(1))
            .map(|(key, rows)| (key.clone(), rows.len()))
            .collect()
    }

    pub fn count(&self, key: &BinKey) -> usize {
        self.rows_by_bin.get(key).map_or(0, Vec::len)
    }

    /// Row positions falling in `key`, in frame order.
    pub fn rows_in_bin(&self, key: &BinKey) -> &[usize] {
        self.rows_by_bin
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The rows of a single bin combination as a new frame.
    pub fn bin_subset(&self, key: &BinKey) -> Result<DataFrame> {
        take_rows(&self.df, self.rows_in_bin(key))
    }

    /// Non-outlier values of a covariate.
    pub fn binned_values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(numeric_values(&self.df, name)?
            .into_iter()
            .zip(&self.keys)
            .filter_map(|(value, key)| key.as_ref().and(value))
            .collect())
    }
}

/// Gather rows by position into a new frame.
pub(crate) fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&r| r as IdxSize).collect();
    Ok(df.take(&IdxCa::from_vec("idx".into(), idx))?)
}
