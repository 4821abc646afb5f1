//! Covariate specifications
//!
//! A covariate is a numeric column the two populations are stratified over.
//! Specs are plain values: the auto-binning loop never mutates a shared set,
//! it derives a new `CovariateSet` for every bin-count change.

use serde::{Deserialize, Serialize};

use super::error::{Result, SamplingError};

/// Bin count of a covariate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinCount {
    /// User-chosen, never touched by auto-binning
    Fixed(usize),
    /// Tuned by `fit_and_sample`, starting from one bin
    Auto { current: usize },
}

impl BinCount {
    pub fn get(&self) -> usize {
        match self {
            BinCount::Fixed(n) => *n,
            BinCount::Auto { current } => *current,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, BinCount::Auto { .. })
    }

    fn with_count(self, n: usize) -> Self {
        match self {
            BinCount::Fixed(_) => BinCount::Fixed(n),
            BinCount::Auto { .. } => BinCount::Auto { current: n },
        }
    }
}

/// Stratification settings for a single numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CovariateConfig", into = "CovariateConfig")]
pub struct CovariateSpec {
    pub name: String,
    pub bins: BinCount,
    /// Rows below this value are clipped before binning
    pub min_value_allowed: Option<f64>,
    /// Rows above this value are clipped before binning
    pub max_value_allowed: Option<f64>,
    /// Equal-width bins when true, equal-frequency (quantile) bins otherwise
    pub fixed_width: bool,
    /// Whether auto-binning must reach equivalence on this column
    pub auto_bin_require_equivalence: bool,
}

impl CovariateSpec {
    /// Create a spec with default settings. `None` enables auto-binning.
    pub fn new(name: impl Into<String>, n_bins: Option<usize>) -> Self {
        Self {
            name: name.into(),
            bins: match n_bins {
                Some(n) => BinCount::Fixed(n),
                None => BinCount::Auto { current: 1 },
            },
            min_value_allowed: None,
            max_value_allowed: None,
            fixed_width: true,
            auto_bin_require_equivalence: true,
        }
    }

    pub fn min_value_allowed(mut self, value: f64) -> Self {
        self.min_value_allowed = Some(value);
        self
    }

    pub fn max_value_allowed(mut self, value: f64) -> Self {
        self.max_value_allowed = Some(value);
        self
    }

    pub fn fixed_width(mut self, fixed_width: bool) -> Self {
        self.fixed_width = fixed_width;
        self
    }

    pub fn require_equivalence(mut self, required: bool) -> Self {
        self.auto_bin_require_equivalence = required;
        self
    }

    pub fn n_bins(&self) -> usize {
        self.bins.get()
    }

    pub fn is_auto(&self) -> bool {
        self.bins.is_auto()
    }

    /// True if `value` lies inside the configured `[min, max]` bounds.
    pub fn allows(&self, value: f64) -> bool {
        self.min_value_allowed.map_or(true, |min| value >= min)
            && self.max_value_allowed.map_or(true, |max| value <= max)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SamplingError::Configuration(
                "column name must not be empty".to_string(),
            ));
        }
        if self.n_bins() == 0 {
            return Err(SamplingError::Configuration(format!(
                "column '{}' needs at least one bin",
                self.name
            )));
        }
        for bound in [self.min_value_allowed, self.max_value_allowed]
            .into_iter()
            .flatten()
        {
            if !bound.is_finite() {
                return Err(SamplingError::Configuration(format!(
                    "column '{}' has a non-finite bound: {}",
                    self.name, bound
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value_allowed, self.max_value_allowed) {
            if min > max {
                return Err(SamplingError::Configuration(format!(
                    "column '{}' has min_value_allowed {} above max_value_allowed {}",
                    self.name, min, max
                )));
            }
        }
        Ok(())
    }
}

/// Serialized form of a covariate, as read from a JSON column file.
///
/// `n_bins: null` (or absent) selects auto-binning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovariateConfig {
    pub name: String,
    #[serde(default)]
    pub n_bins: Option<usize>,
    #[serde(default)]
    pub min_value_allowed: Option<f64>,
    #[serde(default)]
    pub max_value_allowed: Option<f64>,
    #[serde(default = "default_true")]
    pub fixed_width: bool,
    #[serde(default = "default_true")]
    pub auto_bin_require_equivalence: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<CovariateConfig> for CovariateSpec {
    type Error = SamplingError;

    fn try_from(config: CovariateConfig) -> Result<Self> {
        let spec = CovariateSpec {
            name: config.name,
            bins: match config.n_bins {
                Some(n) => BinCount::Fixed(n),
                None => BinCount::Auto { current: 1 },
            },
            min_value_allowed: config.min_value_allowed,
            max_value_allowed: config.max_value_allowed,
            fixed_width: config.fixed_width,
            auto_bin_require_equivalence: config.auto_bin_require_equivalence,
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl From<CovariateSpec> for CovariateConfig {
    fn from(spec: CovariateSpec) -> Self {
        CovariateConfig {
            n_bins: match spec.bins {
                BinCount::Fixed(n) => Some(n),
                BinCount::Auto { .. } => None,
            },
            name: spec.name,
            min_value_allowed: spec.min_value_allowed,
            max_value_allowed: spec.max_value_allowed,
            fixed_width: spec.fixed_width,
            auto_bin_require_equivalence: spec.auto_bin_require_equivalence,
        }
    }
}

/// Ordered collection of covariate specs, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CovariateSet {
    specs: Vec<CovariateSpec>,
}

impl CovariateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a spec, replacing any spec with the same name in place.
    pub fn insert(&mut self, spec: CovariateSpec) -> Result<()> {
        spec.validate()?;
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CovariateSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CovariateSpec> {
        self.specs.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Return a copy of this set with `name` switched to `n_bins` bins.
    pub fn with_n_bins(&self, name: &str, n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(SamplingError::Configuration(format!(
                "column '{}' needs at least one bin",
                name
            )));
        }
        let mut next = self.clone();
        let spec = next
            .specs
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| SamplingError::Configuration(format!("unknown column '{}'", name)))?;
        spec.bins = spec.bins.with_count(n_bins);
        Ok(next)
    }

    /// Bin counts as `"X:3 bins,Y:1 bins"`.
    pub fn summary(&self) -> String {
        self.specs
            .iter()
            .map(|s| format!("{}:{} bins", s.name, s.n_bins()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<CovariateSpec> for CovariateSet {
    fn from_iter<I: IntoIterator<Item = CovariateSpec>>(iter: I) -> Self {
        let mut set = CovariateSet::new();
        for spec in iter {
            match set.specs.iter_mut().find(|s| s.name == spec.name) {
                Some(existing) => *existing = spec,
                None => set.specs.push(spec),
            }
        }
        set
    }
}
