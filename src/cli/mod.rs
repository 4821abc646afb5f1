//! CLI module - argument parsing

mod args;

pub use args::{BoundsArg, Cli, ColumnArg};
