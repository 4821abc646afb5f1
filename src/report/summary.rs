//! Sampling summary report generation

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use serde::Serialize;

use crate::pipeline::{
    AutoBinOutcome, BinComparison, ClipCounts, EquivalenceOutcome, Result, StratifiedSampling,
};

/// Snapshot of a finished sampling run
#[derive(Debug, Clone, Serialize)]
pub struct SamplingSummary {
    pub n_train: usize,
    pub n_test: usize,
    pub n_sampled: usize,
    pub n_samples_approx: Option<usize>,
    pub ratio: f64,
    pub clipped: ClipCounts,
    pub n_bins: String,
    pub auto_bins: Vec<AutoBinOutcome>,
    pub equivalence: Vec<EquivalenceOutcome>,
    pub bins: Vec<BinComparison>,
}

impl SamplingSummary {
    /// Collect the summary from a fitted and sampled model.
    pub fn from_model(model: &StratifiedSampling) -> Result<Self> {
        let diagnostics = model.diagnostics()?;
        let columns = model.columns().names();
        Ok(Self {
            n_train: diagnostics.n_train(),
            n_test: diagnostics.n_test(),
            n_sampled: diagnostics.n_sampled(),
            n_samples_approx: model.n_samples_approx(),
            ratio: diagnostics.n_sampled_to_n_train_ratio(),
            clipped: diagnostics.clipped(),
            n_bins: model.n_bins_summary(),
            auto_bins: model.auto_bin_report().to_vec(),
            equivalence: diagnostics.equivalence_report(columns.as_slice())?,
            bins: diagnostics.bin_comparison(),
        })
    }

    /// Bins with train rows but nothing sampled.
    pub fn starved_bins(&self) -> usize {
        self.bins
            .iter()
            .filter(|b| b.train > 0 && b.sample == 0)
            .count()
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("SAMPLING SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![Cell::new("Train rows (binned)"), Cell::new(self.n_train)]);
        table.add_row(vec![Cell::new("Test rows (binned)"), Cell::new(self.n_test)]);
        table.add_row(vec![
            Cell::new("Requested sample"),
            Cell::new(
                self.n_samples_approx
                    .map_or_else(|| "max".to_string(), |n| n.to_string()),
            ),
        ]);
        table.add_row(vec![
            Cell::new("Sampled rows"),
            Cell::new(self.n_sampled)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("Sampled : train"),
            Cell::new(format!("{:.2}:1", self.ratio)),
        ]);
        table.add_row(vec![
            Cell::new("Clipped (train / test)"),
            Cell::new(format!("{} / {}", self.clipped.train, self.clipped.test)).fg(
                if self.clipped.train + self.clipped.test == 0 {
                    Color::White
                } else {
                    Color::Yellow
                },
            ),
        ]);
        table.add_row(vec![Cell::new("Bins"), Cell::new(&self.n_bins)]);
        let starved = self.starved_bins();
        table.add_row(vec![
            Cell::new("Unmatched train bins"),
            Cell::new(starved).fg(if starved == 0 { Color::White } else { Color::Red }),
        ]);
        print_indented(&table);

        if !self.auto_bins.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("🔁").cyan(),
                style("AUTO-BINNING").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for outcome in &self.auto_bins {
                println!(
                    "      {} {} bins after {} iteration(s) {}",
                    style(&outcome.column).yellow(),
                    style(outcome.n_bins).bold(),
                    outcome.iterations,
                    style(format!("({:?})", outcome.termination)).dim()
                );
            }
        }

        if !self.equivalence.is_empty() {
            println!();
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_header(vec![
                Cell::new("Covariate").add_attribute(Attribute::Bold),
                Cell::new("Statistic").add_attribute(Attribute::Bold),
                Cell::new("p-value").add_attribute(Attribute::Bold),
                Cell::new("Equivalent").add_attribute(Attribute::Bold),
            ]);
            for outcome in &self.equivalence {
                let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
                table.add_row(vec![
                    Cell::new(&outcome.column),
                    Cell::new(fmt(outcome.statistic)),
                    Cell::new(fmt(outcome.p_value)),
                    if outcome.passed {
                        Cell::new("yes").fg(Color::Green)
                    } else {
                        Cell::new("no").fg(Color::Red)
                    },
                ]);
            }
            print_indented(&table);
        }
    }

    /// Per-bin table of train, test and sample counts
    pub fn display_bins(&self) {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Bin").add_attribute(Attribute::Bold),
            Cell::new("Train").add_attribute(Attribute::Bold),
            Cell::new("Test").add_attribute(Attribute::Bold),
            Cell::new("Sample").add_attribute(Attribute::Bold),
            Cell::new("Train %").add_attribute(Attribute::Bold),
            Cell::new("Sample %").add_attribute(Attribute::Bold),
        ]);
        for bin in &self.bins {
            let sample_cell = Cell::new(bin.sample);
            table.add_row(vec![
                Cell::new(bin.key.to_string()),
                Cell::new(bin.train),
                Cell::new(bin.test),
                if bin.train > 0 && bin.sample == 0 {
                    sample_cell.fg(Color::Red)
                } else {
                    sample_cell
                },
                Cell::new(format!("{:.1}", bin.train_share * 100.0)),
                Cell::new(format!("{:.1}", bin.sample_share * 100.0)),
            ]);
        }
        println!();
        print_indented(&table);
    }
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}
