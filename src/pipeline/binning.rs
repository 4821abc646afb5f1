//! Bin edge construction
//!
//! Edges are fitted on the train population only and then reused, unchanged,
//! to label the test population and every sample drawn from it.

use serde::Serialize;

use super::error::{Result, SamplingError};

/// Ordered, strictly increasing bin edges for one covariate.
///
/// Bin `i` covers `[edges[i], edges[i + 1])`; the last bin also includes its
/// upper edge so the fitted maximum is always binnable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinEdges {
    pub column: String,
    pub edges: Vec<f64>,
    pub fixed_width: bool,
}

impl BinEdges {
    /// Equal-width edges between the minimum and maximum of `values`.
    pub fn fixed_width(column: &str, values: &[f64], n_bins: usize) -> Result<Self> {
        let (lo, hi) = checked_range(column, values, n_bins)?;
        let width = (hi - lo) / n_bins as f64;

        let mut edges: Vec<f64> = (0..n_bins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);

        Self::from_edges(column, edges, true)
    }

    /// Equal-frequency edges at the empirical quantiles `0, 1/n, ..., 1`.
    ///
    /// Quantiles use linear interpolation between order statistics. Repeated
    /// values collapse neighbouring edges, which is reported as an error
    /// rather than silently merging bins.
    pub fn quantile(column: &str, values: &[f64], n_bins: usize) -> Result<Self> {
        checked_range(column, values, n_bins)?;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let edges = (0..=n_bins)
            .map(|i| interpolated_quantile(&sorted, i as f64 / n_bins as f64))
            .collect();

        Self::from_edges(column, edges, false)
    }

    fn from_edges(column: &str, edges: Vec<f64>, fixed_width: bool) -> Result<Self> {
        if let Some(pair) = edges.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SamplingError::Binning {
                column: column.to_string(),
                reason: format!(
                    "bin edges are not strictly increasing ({} then {}); too few distinct values for {} bins",
                    pair[0],
                    pair[1],
                    edges.len() - 1
                ),
            });
        }
        Ok(Self {
            column: column.to_string(),
            edges,
            fixed_width,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn lower(&self) -> f64 {
        self.edges[0]
    }

    pub fn upper(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin index of `value`, or `None` if it falls outside the fitted range.
    pub fn assign(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.lower() || value > self.upper() {
            return None;
        }
        let at_or_below = self.edges.partition_point(|edge| *edge <= value);
        Some((at_or_below - 1).min(self.n_bins() - 1))
    }
}

/// Validate inputs shared by both edge strategies and return `(min, max)`.
fn checked_range(column: &str, values: &[f64], n_bins: usize) -> Result<(f64, f64)> {
    let fail = |reason: String| SamplingError::Binning {
        column: column.to_string(),
        reason,
    };

    if n_bins == 0 {
        return Err(fail("at least one bin is required".to_string()));
    }
    if values.is_empty() {
        return Err(fail("no values to bin".to_string()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(fail("values must be finite".to_string()));
    }

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        return Err(fail(format!("zero variance (every value is {})", lo)));
    }
    Ok((lo, hi))
}

/// Quantile of an ascending slice with linear interpolation.
fn interpolated_quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = (below + 1).min(sorted.len() - 1);
    let frac = position - below as f64;
    sorted[below] + frac * (sorted[above] - sorted[below])
}

/// Compute bin edges for one column.
pub fn bin(values: &[f64], name: &str, n_bins: usize, fixed_width: bool) -> Result<BinEdges> {
    if fixed_width {
        BinEdges::fixed_width(name, values, n_bins)
    } else {
        BinEdges::quantile(name, values, n_bins)
    }
}

/// Fitted edges for every covariate, in covariate order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Binning {
    columns: Vec<BinEdges>,
}

impl Binning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit edges for `name` and add (or replace) them.
    pub fn bin(&mut self, values: &[f64], name: &str, n_bins: usize, fixed_width: bool) -> Result<()> {
        let edges = bin(values, name, n_bins, fixed_width)?;
        match self.columns.iter_mut().find(|c| c.column == name) {
            Some(existing) => *existing = edges,
            None => self.columns.push(edges),
        }
        Ok(())
    }

    pub fn columns(&self) -> &[BinEdges] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&BinEdges> {
        self.columns.iter().find(|c| c.column == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }

    /// Total number of bin combinations (product of per-column bin counts).
    pub fn n_combinations(&self) -> usize {
        self.columns.iter().map(BinEdges::n_bins).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_edges_evenly_spaced() {
        let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let edges = BinEdges::fixed_width("x", &values, 4).unwrap();

        assert_eq!(edges.edges, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(edges.n_bins(), 4);
    }

    #[test]
    fn test_fixed_width_last_bin_includes_max() {
        let edges = BinEdges::fixed_width("x", &[0.0, 5.0, 10.0], 2).unwrap();
        assert_eq!(edges.assign(10.0), Some(1));
        assert_eq!(edges.assign(0.0), Some(0));
        assert_eq!(edges.assign(5.0), Some(1));
    }

    #[test]
    fn test_assign_outside_range_is_none() {
        let edges = BinEdges::fixed_width("x", &[0.0, 10.0], 2).unwrap();
        assert_eq!(edges.assign(-0.01), None);
        assert_eq!(edges.assign(10.01), None);
        assert_eq!(edges.assign(f64::NAN), None);
    }

    #[test]
    fn test_quantile_edges_match_interpolation() {
        let values: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let edges = BinEdges::quantile("x", &values, 3).unwrap();
        assert_eq!(edges.edges, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_quantile_rejects_repeated_values() {
        let values = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0];
        let err = BinEdges::quantile("x", &values, 4).unwrap_err();
        assert!(matches!(err, SamplingError::Binning { .. }));
    }

    #[test]
    fn test_zero_variance_is_binning_error() {
        for fixed_width in [true, false] {
            let err = bin(&[3.0; 20], "flat", 1, fixed_width).unwrap_err();
            assert!(err.to_string().contains("zero variance"));
        }
    }

    #[test]
    fn test_zero_bins_and_empty_values_rejected() {
        assert!(bin(&[1.0, 2.0], "x", 0, true).is_err());
        assert!(bin(&[], "x", 2, false).is_err());
    }

    #[test]
    fn test_single_bin_covers_everything() {
        let values = vec![1.0, 4.0, 2.5, 9.0];
        let edges = bin(&values, "x", 1, false).unwrap();
        assert!(values.iter().all(|v| edges.assign(*v) == Some(0)));
    }

    #[test]
    fn test_binning_replaces_existing_column() {
        let mut binning = Binning::new();
        binning.bin(&[0.0, 1.0, 2.0, 3.0], "a", 2, true).unwrap();
        binning.bin(&[0.0, 1.0], "b", 1, true).unwrap();
        binning.bin(&[0.0, 1.0, 2.0, 3.0], "a", 3, true).unwrap();

        assert_eq!(binning.names(), vec!["a", "b"]);
        assert_eq!(binning.get("a").unwrap().n_bins(), 3);
        assert_eq!(binning.n_combinations(), 3);
    }
}
