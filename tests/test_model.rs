//! End-to-end tests for the stratified sampling orchestrator

use std::cell::Cell;
use std::rc::Rc;

use eesampling::pipeline::{
    CovariateSpec, FitAndSampleOptions, FitOptions, SampleOptions, SamplingError,
    StratifiedSampling, Termination,
};
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_fixed_bins_sample_mirrors_train() {
    let train = common::create_uniform_dataframe(100, 11);
    let test = common::create_uniform_dataframe(1000, 12);

    let mut model = StratifiedSampling::new();
    model.add_column(CovariateSpec::new("X", Some(5))).unwrap();
    let options = FitAndSampleOptions {
        n_samples_approx: Some(100),
        ..Default::default()
    };
    let sample = model.fit_and_sample(&train, &test, options).unwrap();

    common::assert_shape(&sample, 100, 2);
    common::assert_has_columns(&sample, &["X", "id"]);
    assert!(model.auto_bin_report().is_empty());

    let diagnostics = model.diagnostics().unwrap();
    assert_eq!(diagnostics.n_train(), 100);
    assert_eq!(diagnostics.n_sampled(), 100);
    for bin in diagnostics.bin_comparison() {
        assert_eq!(bin.sample, bin.train, "bin {} out of proportion", bin.key);
    }
}

#[test]
fn test_sample_holds_original_test_values() {
    let train = common::create_uniform_dataframe(100, 13);
    let test = common::create_uniform_dataframe(1000, 14);

    let mut model = StratifiedSampling::new();
    model.add_column(CovariateSpec::new("X", Some(4))).unwrap();
    model.fit(&train, FitOptions::default()).unwrap();
    let sample = model.sample(&test, SampleOptions::new(Some(50))).unwrap();

    let test_x = common::column_values(&test, "X");
    let ids = common::column_values(&sample, "id");
    let xs = common::column_values(&sample, "X");
    for (id, x) in ids.iter().zip(&xs) {
        assert_eq!(test_x[*id as usize], *x);
    }
}

#[test]
fn test_multi_covariate_draws_follow_allocation() {
    let train = common::create_two_covariate_dataframe(300, 21);
    let test = common::create_two_covariate_dataframe(3000, 22);

    let mut model = StratifiedSampling::new();
    model
        .add_column(CovariateSpec::new("age", Some(3)))
        .unwrap()
        .add_column(CovariateSpec::new("usage", Some(2)).fixed_width(false))
        .unwrap();
    model.fit(&train, FitOptions::default()).unwrap();
    model.sample(&test, SampleOptions::default()).unwrap();

    assert_eq!(model.binning().unwrap().n_combinations(), 6);
    let plan = model.allocation().unwrap().clone();
    let bins = model.diagnostics().unwrap().bin_comparison();
    for quota in &plan.quotas {
        assert_eq!(quota.draw, quota.target);
        let bin = bins.iter().find(|b| b.key == quota.key).unwrap();
        assert_eq!(bin.sample, quota.draw);
    }
}

#[test]
fn test_zero_variance_needs_perturbation() {
    let train = common::create_constant_dataframe(50);

    let mut model = StratifiedSampling::new();
    model
        .add_column(CovariateSpec::new("X", Some(1)).fixed_width(false))
        .unwrap();

    let err = model
        .fit(
            &train,
            FitOptions {
                perturb: false,
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, SamplingError::Binning { .. }));
    assert!(!model.is_fitted());

    model.fit(&train, FitOptions::default()).unwrap();
    assert_eq!(model.binning().unwrap().get("X").unwrap().n_bins(), 1);
    assert_eq!(model.data_train().unwrap().n_binned(), 50);
}

#[test]
fn test_rows_outside_bounds_are_clipped() {
    let train = common::create_uniform_dataframe(200, 31);
    let test = common::create_uniform_dataframe(1000, 32);

    let mut model = StratifiedSampling::new();
    model
        .add_column(CovariateSpec::new("X", Some(4)).max_value_allowed(50.0))
        .unwrap();
    let sample = model
        .fit_and_sample(&train, &test, FitAndSampleOptions::default())
        .unwrap();

    assert!(sample.height() > 0);
    assert!(common::column_values(&sample, "X").iter().all(|x| *x <= 50.0));
    let clipped = model.diagnostics().unwrap().clipped();
    assert!(clipped.train > 0);
    assert!(clipped.test > 0);
}

#[test]
fn test_rows_on_a_bound_are_never_outliers() {
    // Half the train rows sit exactly on the upper bound
    let x: Vec<f64> = (0..49)
        .map(|i| i as f64)
        .chain(std::iter::repeat(50.0).take(51))
        .collect();
    let train = df! { "X" => x }.unwrap();

    let mut model = StratifiedSampling::new();
    model
        .add_column(CovariateSpec::new("X", Some(3)).max_value_allowed(50.0))
        .unwrap();
    model.fit(&train, FitOptions::default()).unwrap();

    let data_train = model.data_train().unwrap();
    assert_eq!(data_train.len(), 100);
    assert_eq!(data_train.n_outliers(), 0);
    assert_eq!(data_train.n_binned(), 100);
}

#[test]
fn test_missing_covariate_column() {
    let train = common::create_uniform_dataframe(20, 1);
    let test = df! { "Y" => [1.0f64, 2.0] }.unwrap();

    let mut model = StratifiedSampling::new();
    model.add_column(CovariateSpec::new("X", Some(2))).unwrap();
    model.fit(&train, FitOptions::default()).unwrap();

    match model.sample(&test, SampleOptions::default()).unwrap_err() {
        SamplingError::MissingColumns(missing) => assert_eq!(missing, vec!["X"]),
        other => panic!("expected MissingColumns, got {:?}", other),
    }
}

#[test]
fn test_diagnostics_track_latest_sample() {
    let train = common::create_uniform_dataframe(100, 41);
    let test = common::create_uniform_dataframe(1000, 42);

    let mut model = StratifiedSampling::new();
    model.add_column(CovariateSpec::new("X", Some(4))).unwrap();
    model.fit(&train, FitOptions::default()).unwrap();

    model.sample(&test, SampleOptions::new(Some(100))).unwrap();
    assert_eq!(model.diagnostics().unwrap().n_sampled(), 100);

    model.sample(&test, SampleOptions::new(Some(200))).unwrap();
    let diagnostics = model.diagnostics().unwrap();
    assert_eq!(diagnostics.n_sampled(), 200);
    assert!((diagnostics.n_sampled_to_n_train_ratio() - 2.0).abs() < 1e-12);
}

#[test]
fn test_same_seed_reproduces_sample() {
    let train = common::create_uniform_dataframe(100, 51);
    let test = common::create_uniform_dataframe(1000, 52);

    let run = |seed: u64| {
        let mut model = StratifiedSampling::new();
        model.add_column(CovariateSpec::new("X", Some(5))).unwrap();
        let options = FitAndSampleOptions {
            n_samples_approx: Some(100),
            random_seed: seed,
            ..Default::default()
        };
        let sample = model.fit_and_sample(&train, &test, options).unwrap();
        common::column_values(&sample, "id")
    };

    assert_eq!(run(3), run(3));
    assert_ne!(run(3), run(4));
}

#[test]
fn test_auto_bin_grows_until_equivalent() {
    let train = common::create_uniform_dataframe(200, 61);
    let test = common::create_uniform_dataframe(5000, 62);

    // Passes on the third comparison
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut model = StratifiedSampling::with_equivalence_test(move |_: &[f64], _: &[f64]| {
        counter.set(counter.get() + 1);
        counter.get() >= 3
    });
    model.add_column(CovariateSpec::new("X", None)).unwrap();
    model
        .fit_and_sample(&train, &test, FitAndSampleOptions::default())
        .unwrap();

    let report = model.auto_bin_report();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].termination, Termination::Equivalence);
    assert_eq!(report[0].n_bins, 3);
    assert_eq!(report[0].iterations, 3);
    assert_eq!(model.get_n_bins("X"), Some(3));
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_auto_bin_backs_off_at_ratio_floor() {
    // Test is ten times denser than train everywhere except the top decile
    let train_x: Vec<f64> = (0..99)
        .map(|i| i as f64 + 0.5)
        .chain(std::iter::once(99.77))
        .collect();
    let test_x: Vec<f64> = (1..100)
        .flat_map(|k| {
            let copies = if k < 90 { 10 } else { 1 };
            std::iter::repeat(k as f64 + 0.49).take(copies)
        })
        .collect();
    let train = df! { "X" => train_x }.unwrap();
    let test = df! { "X" => test_x }.unwrap();

    let mut model = StratifiedSampling::new();
    model
        .add_column(CovariateSpec::new("X", None).require_equivalence(false))
        .unwrap();
    model
        .fit_and_sample(&train, &test, FitAndSampleOptions::default())
        .unwrap();

    let outcome = &model.auto_bin_report()[0];
    assert_eq!(outcome.termination, Termination::RatioFloor);
    assert_eq!(outcome.iterations, 7);
    assert_eq!(outcome.n_bins, 6);
    assert_eq!(model.n_bins_summary(), "X:6 bins");
    assert!(model.diagnostics().unwrap().n_sampled_to_n_train_ratio() >= 4.0);
}

#[test]
fn test_auto_bin_reverts_when_equivalent_sample_is_too_small() {
    // Same pools as above; the sampled-to-train ratio first drops below 4 at 7 bins
    let train_x: Vec<f64> = (0..99)
        .map(|i| i as f64 + 0.5)
        .chain(std::iter::once(99.77))
        .collect();
    let test_x: Vec<f64> = (1..100)
        .flat_map(|k| {
            let copies = if k < 90 { 10 } else { 1 };
            std::iter::repeat(k as f64 + 0.49).take(copies)
        })
        .collect();
    let train = df! { "X" => train_x }.unwrap();
    let test = df! { "X" => test_x }.unwrap();

    // Equivalence first holds at 7 bins
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut model = StratifiedSampling::with_equivalence_test(move |_: &[f64], _: &[f64]| {
        counter.set(counter.get() + 1);
        counter.get() >= 7
    });
    model.add_column(CovariateSpec::new("X", None)).unwrap();
    model
        .fit_and_sample(&train, &test, FitAndSampleOptions::default())
        .unwrap();

    let outcome = &model.auto_bin_report()[0];
    assert_eq!(outcome.termination, Termination::RatioFloor);
    assert_eq!(outcome.iterations, 7);
    assert_eq!(outcome.n_bins, 6);
    assert_eq!(model.get_n_bins("X"), Some(6));
    assert_eq!(calls.get(), 7);
    assert!(model.diagnostics().unwrap().n_sampled_to_n_train_ratio() >= 4.0);
}

#[test]
fn test_auto_bin_reports_convergence_failure() {
    let train = df! { "x" => (0..10).map(|i| i as f64).collect::<Vec<_>>() }.unwrap();
    let test = df! { "x" => (0..100).map(|i| i as f64 * 0.1).collect::<Vec<_>>() }.unwrap();

    let mut model = StratifiedSampling::with_equivalence_test(|_: &[f64], _: &[f64]| false);
    model.add_column(CovariateSpec::new("x", None)).unwrap();
    let options = FitAndSampleOptions {
        min_n_sampled_to_n_train_ratio: None,
        ..Default::default()
    };

    match model.fit_and_sample(&train, &test, options).unwrap_err() {
        SamplingError::Convergence { column, .. } => assert_eq!(column, "x"),
        other => panic!("expected Convergence, got {:?}", other),
    }
    // The failing bin count is kept for inspection
    assert!(model.get_n_bins("x").unwrap() >= 2);
}

#[test]
fn test_set_n_bins_updates_summary() {
    let mut model = StratifiedSampling::new();
    model
        .add_column(CovariateSpec::new("X", Some(3)))
        .unwrap()
        .add_column(CovariateSpec::new("Y", None))
        .unwrap();
    assert_eq!(model.n_bins_summary(), "X:3 bins,Y:1 bins");

    model.set_n_bins("Y", 4).unwrap();
    assert_eq!(model.get_n_bins("Y"), Some(4));
    assert!(model.columns().get("Y").unwrap().is_auto());
    assert!(model.set_n_bins("Z", 2).is_err());
}
