//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// `rows` values drawn uniformly from `[lo, hi)` with a fixed seed.
pub fn uniform_values(rows: usize, lo: f64, hi: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows).map(|_| rng.gen_range(lo..hi)).collect()
}

/// Single-covariate table `X` uniform in `[0, 100)` plus a row id.
pub fn create_uniform_dataframe(rows: usize, seed: u64) -> DataFrame {
    df! {
        "X" => uniform_values(rows, 0.0, 100.0, seed),
        "id" => (0..rows as i64).collect::<Vec<_>>(),
    }
    .unwrap()
}

/// Two independent covariates for multi-column stratification.
pub fn create_two_covariate_dataframe(rows: usize, seed: u64) -> DataFrame {
    df! {
        "age" => uniform_values(rows, 18.0, 90.0, seed),
        "usage" => uniform_values(rows, 0.0, 5000.0, seed + 1),
        "id" => (0..rows as i64).collect::<Vec<_>>(),
    }
    .unwrap()
}

/// A covariate whose every value is identical
pub fn create_constant_dataframe(rows: usize) -> DataFrame {
    df! {
        "X" => vec![5.0f64; rows],
        "id" => (0..rows as i64).collect::<Vec<_>>(),
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame, name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = write_csv(&temp_dir, df, name);
    (temp_dir, csv_path)
}

/// Write `df` as CSV into an existing temporary directory
pub fn write_csv(dir: &TempDir, df: &mut DataFrame, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame, name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join(name);

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Float values of a column
pub fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}
