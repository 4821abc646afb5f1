//! Pre-processing applied to both populations before binning
//!
//! Clipping removes rows outside each covariate's allowed bounds and
//! perturbation adds seeded sub-epsilon noise so heavily repeated values
//! (typically zero) do not collapse quantile edges.

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::covariate::CovariateSet;
use super::error::{Result, SamplingError};

/// Relative noise amplitude applied by `perturb`
pub const PERTURBATION_SCALE: f64 = 1e-6;

/// Read a column as `f64`, keeping nulls as `None`.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Fail unless the set is non-empty and every covariate exists in `df`.
pub fn check_columns_present(df: &DataFrame, covariates: &CovariateSet) -> Result<()> {
    if covariates.is_empty() {
        return Err(SamplingError::NoColumns);
    }
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<String> = covariates
        .names()
        .into_iter()
        .filter(|name| !present.contains(name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SamplingError::MissingColumns(missing))
    }
}

/// Drop rows whose covariates fall outside `[min_value_allowed, max_value_allowed]`.
///
/// Returns the kept rows and the number of rows removed. A null value is
/// removed only when its covariate has a bound configured.
pub fn chop_outliers(df: &DataFrame, covariates: &CovariateSet) -> Result<(DataFrame, usize)> {
    let mut keep = vec![true; df.height()];

    for spec in covariates.iter() {
        if spec.min_value_allowed.is_none() && spec.max_value_allowed.is_none() {
            continue;
        }
        for (row, value) in numeric_values(df, &spec.name)?.into_iter().enumerate() {
            let allowed = value.is_some_and(|v| spec.allows(v));
            keep[row] &= allowed;
        }
    }

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped == 0 {
        return Ok((df.clone(), 0));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok((df.filter(&mask)?, dropped))
}

/// Add uniform noise in `±range * PERTURBATION_SCALE / 2` to each named column.
///
/// One generator seeded with `random_seed` feeds every column in order, so
/// the same seed and input always give the same output. A constant column
/// uses its magnitude (at least 1) in place of the zero range.
pub fn perturb(df: &DataFrame, names: &[String], random_seed: u64) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(random_seed);
    let mut perturbed = df.clone();

    for name in names {
        let values = numeric_values(df, name)?;
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            continue;
        }

        let lo = present.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if hi > lo {
            hi - lo
        } else {
            lo.abs().max(1.0)
        };
        let amplitude = range * PERTURBATION_SCALE;

        let noisy: Vec<Option<f64>> = values
            .into_iter()
            .map(|value| {
                let noise = (rng.gen::<f64>() - 0.5) * amplitude;
                value.map(|v| v + noise)
            })
            .collect();

        perturbed.with_column(Column::new(name.as_str().into(), noisy))?;
    }

    Ok(perturbed)
}
