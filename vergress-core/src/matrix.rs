//! Run Matrix
//!
//! The [`RunMatrix`] holds every [`Measurement`] of an orchestration run,
//! indexed by version, then by query position, then by repetition. Query
//! indexing is positional by design: index `i` refers to the same query in
//! every version's sequence, and the comparison pass depends on that
//! alignment. The matrix is filled cell-by-cell by the orchestrator and is
//! read-only once the run completes.

use crate::measurement::Measurement;
use serde::{Deserialize, Serialize};

/// One (version, query) cell: the repetition runs that succeeded, plus the
/// failure messages recorded under the continue-on-error policy. Under the
/// default fail-fast policy `failures` is always empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Successful repetition runs, in execution order
    pub measurements: Vec<Measurement>,
    /// Failure messages for repetitions excluded from the selection pool
    pub failures: Vec<String>,
}

impl Cell {
    /// Total repetitions attempted in this cell.
    pub fn attempts(&self) -> usize {
        self.measurements.len() + self.failures.len()
    }
}

/// All measurements of one orchestration run.
///
/// Owned exclusively by the orchestrator while it fills the matrix, then
/// handed to the comparison pass by reference. `completed` is set only when
/// the full version × query × repetition space has been attempted; the
/// comparison pass rejects an incomplete matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMatrix {
    versions: Vec<String>,
    query_names: Vec<String>,
    repeat: usize,
    cells: Vec<Vec<Cell>>,
    completed: bool,
}

impl RunMatrix {
    /// Create an empty matrix for the given version order and query names.
    pub fn new(versions: Vec<String>, query_names: Vec<String>, repeat: usize) -> Self {
        let cells = versions
            .iter()
            .map(|_| query_names.iter().map(|_| Cell::default()).collect())
            .collect();
        Self {
            versions,
            query_names,
            repeat,
            cells,
            completed: false,
        }
    }

    /// Versions in orchestration order.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Query names in the shared positional order.
    pub fn query_names(&self) -> &[String] {
        &self.query_names
    }

    /// Configured repetitions per cell.
    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Whether the orchestration run filled the whole matrix.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// The cell for a version index and query index.
    ///
    /// Panics on out-of-range indices; the orchestrator and comparator only
    /// ever index within the bounds they were constructed with.
    pub fn cell(&self, version_idx: usize, query_idx: usize) -> &Cell {
        &self.cells[version_idx][query_idx]
    }

    pub(crate) fn record(&mut self, version_idx: usize, query_idx: usize, m: Measurement) {
        self.cells[version_idx][query_idx].measurements.push(m);
    }

    pub(crate) fn record_failure(&mut self, version_idx: usize, query_idx: usize, msg: String) {
        self.cells[version_idx][query_idx].failures.push(msg);
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Build an already-completed matrix from per-cell measurement sequences,
    /// shaped `cells[version_idx][query_idx]`. Intended for tests and for
    /// replaying recorded runs through the comparison pass.
    pub fn from_cells(
        versions: Vec<String>,
        query_names: Vec<String>,
        cells: Vec<Vec<Vec<Measurement>>>,
    ) -> Self {
        let repeat = cells
            .first()
            .and_then(|row| row.first())
            .map(|c| c.len())
            .unwrap_or(1);
        let cells = cells
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|measurements| Cell {
                        measurements,
                        failures: Vec::new(),
                    })
                    .collect()
            })
            .collect();
        Self {
            versions,
            query_names,
            repeat,
            cells,
            completed: true,
        }
    }
}
