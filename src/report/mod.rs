//! Report module - summarizing sampling results

pub mod summary;

pub use summary::*;
