//! Distributional equivalence between the train population and a sample
//!
//! The auto-binning loop only needs a pass/fail answer per covariate, so the
//! statistic is pluggable through [`EquivalenceTest`]. The default is the
//! two-sample Kolmogorov-Smirnov test.

use serde::Serialize;

/// Outcome of comparing one covariate's train and sample values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquivalenceOutcome {
    pub column: String,
    /// Test statistic, if the test reports one
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub passed: bool,
}

/// Judges whether two samples of a covariate are distributionally equivalent.
pub trait EquivalenceTest {
    fn compare(&self, column: &str, train: &[f64], sample: &[f64]) -> EquivalenceOutcome;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> EquivalenceTest for F
where
    F: Fn(&[f64], &[f64]) -> bool,
{
    fn compare(&self, column: &str, train: &[f64], sample: &[f64]) -> EquivalenceOutcome {
        EquivalenceOutcome {
            column: column.to_string(),
            statistic: None,
            p_value: None,
            passed: self(train, sample),
        }
    }
}

/// Two-sample Kolmogorov-Smirnov test.
///
/// Equivalence is accepted when the p-value is at least `alpha`, i.e. the test
/// fails to reject that both samples share a distribution.
#[derive(Debug, Clone)]
pub struct KsTest {
    pub alpha: f64,
}

impl Default for KsTest {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl KsTest {
    pub fn with_alpha(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl EquivalenceTest for KsTest {
    fn compare(&self, column: &str, train: &[f64], sample: &[f64]) -> EquivalenceOutcome {
        if train.is_empty() || sample.is_empty() {
            return EquivalenceOutcome {
                column: column.to_string(),
                statistic: None,
                p_value: None,
                passed: false,
            };
        }
        let (d_stat, p_value) = ks_two_sample(train, sample);
        EquivalenceOutcome {
            column: column.to_string(),
            statistic: Some(d_stat),
            p_value: Some(p_value),
            passed: p_value >= self.alpha,
        }
    }

    fn name(&self) -> &str {
        "ks-test"
    }
}

/// Two-sample KS statistic `D` and its asymptotic p-value.
pub fn ks_two_sample(sample1: &[f64], sample2: &[f64]) -> (f64, f64) {
    let n1 = sample1.len();
    let n2 = sample2.len();

    let mut s1 = sample1.to_vec();
    let mut s2 = sample2.to_vec();
    s1.sort_by(|a, b| a.total_cmp(b));
    s2.sort_by(|a, b| a.total_cmp(b));

    // Walk both sorted samples once, comparing ECDFs after each distinct value
    let (mut i, mut j) = (0usize, 0usize);
    let mut d_max = 0.0f64;
    while i < n1 && j < n2 {
        let x = s1[i].min(s2[j]);
        while i < n1 && s1[i] <= x {
            i += 1;
        }
        while j < n2 && s2[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n1 as f64 - j as f64 / n2 as f64).abs();
        d_max = d_max.max(diff);
    }

    let n = (n1 * n2) as f64 / (n1 + n2) as f64;
    let z = d_max * n.sqrt();
    (d_max, ks_p_value(z))
}

/// Survival function of the Kolmogorov distribution.
///
/// `P(K > z) = 2 * sum_{k>=1} (-1)^{k-1} exp(-2 k^2 z^2)`
fn ks_p_value(z: f64) -> f64 {
    if z <= 0.0 {
        return 1.0;
    }
    if z > 3.0 {
        return 2.0 * (-2.0 * z * z).exp();
    }
    // The alternating series converges slowly for small z, where p is ~1 anyway
    if z < 0.2 {
        return 1.0;
    }

    let mut p = 0.0;
    for k in 1..=100 {
        let term = (-2.0 * (k as f64).powi(2) * z * z).exp();
        if k % 2 == 1 {
            p += term;
        } else {
            p -= term;
        }
        if term < 1e-12 {
            break;
        }
    }
    (2.0 * p).clamp(0.0, 1.0)
}
