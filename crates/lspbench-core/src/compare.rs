//! Aggregating results into a side-by-side comparison.
//!
//! Every ratio is `baseline / primary`, so values above one favour the
//! primary server.

use std::collections::BTreeMap;
use std::fmt;

use crate::result::{BenchmarkResult, MetricKind};

/// Recorded values keyed by operation name, then server name.
pub type Aggregate = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// Groups recorded values by operation and server.
#[must_use]
pub fn aggregate(results: &[BenchmarkResult]) -> Aggregate {
    let mut grouped = Aggregate::new();
    for result in results {
        grouped
            .entry(result.operation().to_owned())
            .or_default()
            .entry(result.lsp().to_owned())
            .or_default()
            .push(result.value());
    }
    grouped
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// How the primary server compares on one operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Primary latency is lower by this factor.
    Faster(f64),
    /// Primary latency is higher by this factor.
    Slower(f64),
    /// Primary memory is lower by this factor.
    Less(f64),
    /// Primary memory is higher by this factor.
    More(f64),
    /// One side has no usable mean.
    NotAvailable,
}

impl Verdict {
    /// Compares two means of the given kind.
    #[must_use]
    pub fn of(kind: MetricKind, primary: Option<f64>, baseline: Option<f64>) -> Self {
        let (Some(primary), Some(baseline)) = (primary, baseline) else {
            return Self::NotAvailable;
        };
        if primary <= 0.0 || baseline <= 0.0 {
            return Self::NotAvailable;
        }
        let ratio = baseline / primary;
        match kind {
            MetricKind::Latency if ratio > 1.0 => Self::Faster(ratio),
            MetricKind::Latency => Self::Slower(ratio.recip()),
            MetricKind::Memory if ratio >= 1.0 => Self::Less(ratio),
            MetricKind::Memory => Self::More(ratio.recip()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faster(factor) => write!(f, "{factor:.1}x faster"),
            Self::Slower(factor) => write!(f, "{factor:.1}x slower"),
            Self::Less(factor) => write!(f, "{factor:.1}x less"),
            Self::More(factor) => write!(f, "{factor:.1}x more"),
            Self::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// One row of the comparison table.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    /// Operation name.
    pub operation: String,
    /// Latency or memory.
    pub kind: MetricKind,
    /// Mean for the primary server.
    pub primary: Option<f64>,
    /// Mean for the baseline server.
    pub baseline: Option<f64>,
    /// Ratio of the means.
    pub verdict: Verdict,
}

/// Per-operation comparison of two servers, sorted by operation name.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    primary: String,
    baseline: String,
    rows: Vec<ComparisonRow>,
}

impl Comparison {
    /// Builds the comparison from raw results.
    #[must_use]
    pub fn build(results: &[BenchmarkResult], primary: &str, baseline: &str) -> Self {
        let rows = aggregate(results)
            .into_iter()
            .map(|(operation, servers)| {
                let kind = MetricKind::of(&operation);
                let side = |name: &str| servers.get(name).map(Vec::as_slice).and_then(mean);
                let (primary_mean, baseline_mean) = (side(primary), side(baseline));
                ComparisonRow {
                    verdict: Verdict::of(kind, primary_mean, baseline_mean),
                    operation,
                    kind,
                    primary: primary_mean,
                    baseline: baseline_mean,
                }
            })
            .collect();
        Self {
            primary: primary.to_owned(),
            baseline: baseline.to_owned(),
            rows,
        }
    }

    /// Rows in operation-name order.
    #[must_use]
    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    /// Looks up the row for `operation`.
    #[must_use]
    pub fn row(&self, operation: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|row| row.operation == operation)
    }
}

fn cell(kind: MetricKind, value: Option<f64>) -> String {
    match (value, kind) {
        (None, _) => String::from("N/A"),
        (Some(value), MetricKind::Latency) => format!("{value:.2}ms"),
        (Some(value), MetricKind::Memory) => format!("{value:.2} MB"),
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<25} {:<20} {:<20} {:<10}",
            "Operation", self.primary, self.baseline, "Comparison"
        )?;
        writeln!(f, "{}", "-".repeat(78))?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<25} {:<20} {:<20} {:<10}",
                row.operation,
                cell(row.kind, row.primary),
                cell(row.kind, row.baseline),
                row.verdict.to_string()
            )?;
        }
        Ok(())
    }
}
