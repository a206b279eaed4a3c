//! Selection and Regression Comparison
//!
//! After a run completes, each (version, query) cell is reduced to one
//! representative measurement by a [`Selector`], and adjacent version pairs
//! are compared query-by-query against a percentage tolerance. The pass is
//! deliberately exhaustive: a failing comparison fails the overall verdict
//! but never stops the remaining comparisons, so a single report covers every
//! decision.

use crate::error::ContractViolation;
use crate::matrix::RunMatrix;
use crate::measurement::Measurement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default regression tolerance, in percent.
pub const DEFAULT_THRESHOLD_PCT: f64 = 10.0;

/// Strategy for picking a cell's representative run out of `repeat` noisy
/// measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selector {
    /// Best-of-N: keep the run with the smallest wall time, first occurrence
    /// winning ties. Matches the reference behavior and is the default.
    #[default]
    Fastest,
    /// Median-by-wall-time; the upper middle is taken for even-sized pools.
    Median,
}

impl Selector {
    /// Pick the representative run. Returns `None` for an empty pool, which
    /// [`compare_all`] surfaces as a [`ContractViolation::EmptySelection`].
    pub fn select<'a>(&self, runs: &'a [Measurement]) -> Option<&'a Measurement> {
        match self {
            Selector::Fastest => select_fastest(runs),
            Selector::Median => {
                if runs.is_empty() {
                    return None;
                }
                let mut by_wall: Vec<&Measurement> = runs.iter().collect();
                by_wall.sort_by_key(|m| m.wall);
                Some(by_wall[by_wall.len() / 2])
            }
        }
    }
}

/// Stable minimum-by-wall-time: a single linear scan keeping the first
/// occurrence on ties. Returns `None` for an empty pool.
pub fn select_fastest(runs: &[Measurement]) -> Option<&Measurement> {
    let mut best = runs.first()?;
    for m in &runs[1..] {
        if m.wall < best.wall {
            best = m;
        }
    }
    Some(best)
}

/// One baseline-vs-candidate decision for a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Baseline (older) version
    pub baseline_version: String,
    /// Candidate (newer) version
    pub candidate_version: String,
    /// Query name at the shared positional index
    pub query: String,
    /// Representative wall time of the baseline
    pub baseline_wall: Duration,
    /// Representative wall time of the candidate
    pub candidate_wall: Duration,
    /// Tolerance applied, in percent
    pub threshold_pct: f64,
    /// Whether the candidate stayed within tolerance
    pub passed: bool,
}

impl Comparison {
    /// Relative wall-time change of the candidate, in percent.
    ///
    /// `None` when the baseline wall time is zero and the candidate's is not:
    /// the relative change is unbounded there (and any nonzero candidate
    /// already fails the threshold rule). Two zero wall times are no change.
    pub fn change_pct(&self) -> Option<f64> {
        let baseline = self.baseline_wall.as_secs_f64();
        if baseline == 0.0 {
            return self.candidate_wall.is_zero().then_some(0.0);
        }
        Some((self.candidate_wall.as_secs_f64() / baseline - 1.0) * 100.0)
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let change = match self.change_pct() {
            Some(pct) => format!("{pct:+.2}%"),
            None => "n/a".to_string(),
        };
        write!(
            f,
            "{} {}  baseline {:.2?}  candidate {:.2?}  ({}, threshold {}%)",
            if self.passed { "✓" } else { "✗" },
            self.query,
            self.baseline_wall,
            self.candidate_wall,
            change,
            self.threshold_pct,
        )
    }
}

/// Apply the regression decision rule to one baseline/candidate pair.
///
/// The candidate fails when its wall time exceeds the baseline's by more than
/// `threshold_pct` percent. A threshold of 0 means any slowdown at all fails;
/// an equal wall time always passes.
pub fn compare(
    baseline_version: &str,
    candidate_version: &str,
    query: &str,
    baseline: &Measurement,
    candidate: &Measurement,
    threshold_pct: f64,
) -> Comparison {
    let limit = baseline.wall.as_secs_f64() * (1.0 + threshold_pct / 100.0);
    Comparison {
        baseline_version: baseline_version.to_string(),
        candidate_version: candidate_version.to_string(),
        query: query.to_string(),
        baseline_wall: baseline.wall,
        candidate_wall: candidate.wall,
        threshold_pct,
        passed: candidate.wall.as_secs_f64() <= limit,
    }
}

/// Complete comparison pass over a finished matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Tolerance applied to every comparison, in percent
    pub threshold_pct: f64,
    /// Selection strategy used for every cell
    pub selector: Selector,
    /// Every individual decision, in pair-major query-minor order
    pub comparisons: Vec<Comparison>,
    /// Logical AND over all individual decisions
    pub passed: bool,
}

impl ComparisonReport {
    /// Render the report for terminal display. Every comparison is printed
    /// with both wall times and the threshold, pass or fail, so each decision
    /// can be audited without rerunning.
    pub fn render(&self) -> String {
        let mut output = String::new();
        output.push('\n');
        output.push_str("Vergress Regression Report\n");
        output.push_str(&"=".repeat(60));
        output.push('\n');

        let mut current_pair: Option<(&str, &str)> = None;
        for c in &self.comparisons {
            let pair = (c.baseline_version.as_str(), c.candidate_version.as_str());
            if current_pair != Some(pair) {
                output.push_str(&format!("\nComparing {} - {}\n", pair.0, pair.1));
                output.push_str(&"-".repeat(60));
                output.push('\n');
                current_pair = Some(pair);
            }
            output.push_str(&format!("  {}\n", c));
        }

        output.push_str(&format!(
            "\nOverall: {}\n",
            if self.passed { "PASSED" } else { "FAILED" }
        ));
        output
    }
}

/// Compare every adjacent version pair, query by query, over a completed
/// matrix.
///
/// For `k` versions exactly `k - 1` pairs are evaluated, in the caller's
/// version order. The representative run is selected independently from each
/// version's repetition pool; repetitions are never paired by index.
pub fn compare_all(
    matrix: &RunMatrix,
    threshold_pct: f64,
    selector: Selector,
) -> Result<ComparisonReport, ContractViolation> {
    if !matrix.is_completed() {
        return Err(ContractViolation::ResultsBeforeRun);
    }
    let versions = matrix.versions();
    if versions.len() < 2 {
        return Err(ContractViolation::TooFewVersions(versions.len()));
    }

    let mut comparisons = Vec::new();
    let mut passed = true;

    for pair in 0..versions.len() - 1 {
        for (q, query) in matrix.query_names().iter().enumerate() {
            let baseline = pick(matrix, selector, pair, q)?;
            let candidate = pick(matrix, selector, pair + 1, q)?;
            let c = compare(
                &versions[pair],
                &versions[pair + 1],
                query,
                baseline,
                candidate,
                threshold_pct,
            );
            passed &= c.passed;
            comparisons.push(c);
        }
    }

    Ok(ComparisonReport {
        generated_at: Utc::now(),
        threshold_pct,
        selector,
        comparisons,
        passed,
    })
}

fn pick(
    matrix: &RunMatrix,
    selector: Selector,
    version_idx: usize,
    query_idx: usize,
) -> Result<&Measurement, ContractViolation> {
    let cell = matrix.cell(version_idx, query_idx);
    selector
        .select(&cell.measurements)
        .ok_or_else(|| ContractViolation::EmptySelection {
            version: matrix.versions()[version_idx].clone(),
            query: matrix.query_names()[query_idx].clone(),
        })
}
