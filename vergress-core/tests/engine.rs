//! End-to-end tests for the orchestration-and-comparison engine, driven by a
//! scripted executor that replays preset wall times per (version, query) cell.

use std::collections::HashMap;
use std::io;
use std::time::Duration;
use vergress_core::{
    CellExecutor, ErrorPolicy, ExecutionError, Measurement, Orchestrator, Query, Selector,
    compare_all,
};

/// Executor replaying a script of wall times, one entry popped per repetition.
struct ReplayExecutor {
    script: HashMap<(String, String), Vec<u64>>,
    fail_after: Option<usize>,
    calls: usize,
}

impl ReplayExecutor {
    fn new(script: &[(&str, &str, &[u64])]) -> Self {
        let script = script
            .iter()
            .map(|(v, q, walls)| ((v.to_string(), q.to_string()), walls.to_vec()))
            .collect();
        Self {
            script,
            fail_after: None,
            calls: 0,
        }
    }

    fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }
}

impl CellExecutor for ReplayExecutor {
    fn run_cell(&mut self, version: &str, query: &Query) -> Result<Measurement, ExecutionError> {
        if let Some(limit) = self.fail_after {
            if self.calls >= limit {
                return Err(ExecutionError::connect(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "server did not come up",
                )));
            }
        }
        self.calls += 1;

        let walls = self
            .script
            .get_mut(&(version.to_string(), query.name.clone()))
            .expect("script covers every cell");
        let wall = walls.remove(0);
        Ok(Measurement {
            wall: Duration::from_millis(wall),
            user: Duration::from_millis(wall / 2),
            sys: Duration::from_millis(wall / 10),
            memory_bytes: 64 * 1024 * 1024,
            rows: 1000,
        })
    }
}

fn versions(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn queries(names: &[&str]) -> Vec<Query> {
    names
        .iter()
        .map(|n| Query::new(*n, format!("SELECT count(*) FROM {n}")))
        .collect()
}

/// Scenario A: v2's best run (110ms) exceeds v1's best (90ms) by more than
/// 10%, so the overall verdict fails.
#[test]
fn test_scenario_regression_detected() {
    let mut exec = ReplayExecutor::new(&[
        ("v1", "q", &[100, 90, 95]),
        ("v2", "q", &[120, 130, 110]),
    ]);
    let orch = Orchestrator::new(3, ErrorPolicy::FailFast);
    let matrix = orch
        .run(&mut exec, &versions(&["v1", "v2"]), &queries(&["q"]))
        .unwrap();

    let report = compare_all(&matrix, 10.0, Selector::Fastest).unwrap();
    assert!(!report.passed);
    assert_eq!(report.comparisons.len(), 1);
    assert_eq!(report.comparisons[0].baseline_wall, Duration::from_millis(90));
    assert_eq!(
        report.comparisons[0].candidate_wall,
        Duration::from_millis(110)
    );
}

/// Scenario B: v2's best run (95ms) stays within 10% of v1's best (90ms).
#[test]
fn test_scenario_within_tolerance() {
    let mut exec =
        ReplayExecutor::new(&[("v1", "q", &[100, 90, 95]), ("v2", "q", &[95, 98, 99])]);
    let orch = Orchestrator::new(3, ErrorPolicy::FailFast);
    let matrix = orch
        .run(&mut exec, &versions(&["v1", "v2"]), &queries(&["q"]))
        .unwrap();

    let report = compare_all(&matrix, 10.0, Selector::Fastest).unwrap();
    assert!(report.passed);
    assert_eq!(
        report.comparisons[0].candidate_wall,
        Duration::from_millis(95)
    );
}

/// Scenario D: an execution failure on the second cell aborts the whole run
/// under fail-fast; no matrix reaches the comparison pass.
#[test]
fn test_scenario_fail_fast_yields_no_matrix() {
    let mut exec = ReplayExecutor::new(&[
        ("v1", "a", &[100]),
        ("v1", "b", &[100]),
        ("v2", "a", &[100]),
        ("v2", "b", &[100]),
    ])
    .failing_after(1);
    let orch = Orchestrator::new(1, ErrorPolicy::FailFast);
    let result = orch.run(&mut exec, &versions(&["v1", "v2"]), &queries(&["a", "b"]));
    assert!(result.is_err());
}

/// Single-version orchestration succeeds, but comparison rejects the matrix
/// before evaluating anything.
#[test]
fn test_single_version_rejected_at_comparison() {
    let mut exec = ReplayExecutor::new(&[("v1", "q", &[100])]);
    let orch = Orchestrator::new(1, ErrorPolicy::FailFast);
    let matrix = orch
        .run(&mut exec, &versions(&["v1"]), &queries(&["q"]))
        .unwrap();

    assert!(compare_all(&matrix, 10.0, Selector::Fastest).is_err());
}

/// Continue-on-error fills the rest of the matrix and excludes failed
/// repetitions from the selection pool.
#[test]
fn test_continue_on_error_selection_pool() {
    let mut exec = ReplayExecutor::new(&[
        ("v1", "q", &[100, 90]),
        // Only the first v2 repetition runs; the rest fail
        ("v2", "q", &[95, 0]),
    ])
    .failing_after(3);
    let orch = Orchestrator::new(2, ErrorPolicy::Continue);
    let matrix = orch
        .run(&mut exec, &versions(&["v1", "v2"]), &queries(&["q"]))
        .unwrap();

    assert_eq!(matrix.cell(1, 0).measurements.len(), 1);
    assert_eq!(matrix.cell(1, 0).failures.len(), 1);

    let report = compare_all(&matrix, 10.0, Selector::Fastest).unwrap();
    assert!(report.passed);
    assert_eq!(
        report.comparisons[0].candidate_wall,
        Duration::from_millis(95)
    );
}
