//! Orchestration Loop
//!
//! Drives the full version × query × repetition matrix, one cell execution at
//! a time. Iteration order is fixed and load-bearing: outer loop over versions
//! in caller order, middle loop over queries in caller order, inner loop over
//! repetitions. Execution is strictly sequential so that CPU-time and memory
//! measurements are never contaminated by a competing workload.

use crate::error::{ExecutionError, OrchestrationError};
use crate::matrix::RunMatrix;
use crate::measurement::{Measurement, Query};
use tracing::{info, warn};

/// Seam between the engine and the process/protocol plumbing.
///
/// One invocation covers one cell repetition: acquire a running instance of
/// the version's binary, execute the query, capture timing and resource
/// usage, and release the instance. Implementations must be stateless across
/// invocations.
pub trait CellExecutor {
    /// Execute `query` once against `version` and return the measurement.
    fn run_cell(&mut self, version: &str, query: &Query) -> Result<Measurement, ExecutionError>;
}

/// What to do when a single cell execution fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Abort the whole run on the first failure; the partial matrix is
    /// discarded. This is the reference behavior and the default.
    #[default]
    FailFast,
    /// Record the failure in the cell and keep going; failed repetitions are
    /// excluded from that cell's selection pool.
    Continue,
}

/// Fills a [`RunMatrix`] by iterating the execution matrix in its fixed order.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    repeat: usize,
    policy: ErrorPolicy,
}

impl Orchestrator {
    /// Create an orchestrator. A non-positive `repeat` is clamped to 1.
    pub fn new(repeat: usize, policy: ErrorPolicy) -> Self {
        Self {
            repeat: repeat.max(1),
            policy,
        }
    }

    /// Effective repetitions per cell.
    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Execute the full matrix.
    ///
    /// Under [`ErrorPolicy::FailFast`] the first executor failure aborts the
    /// run and the partially filled matrix is not returned. Under
    /// [`ErrorPolicy::Continue`] failures are recorded per cell and the run
    /// always completes.
    pub fn run<E: CellExecutor>(
        &self,
        executor: &mut E,
        versions: &[String],
        queries: &[Query],
    ) -> Result<RunMatrix, OrchestrationError> {
        let query_names = queries.iter().map(|q| q.name.clone()).collect();
        let mut matrix = RunMatrix::new(versions.to_vec(), query_names, self.repeat);

        for (v, version) in versions.iter().enumerate() {
            info!(version = %version, "running version");

            for (q, query) in queries.iter().enumerate() {
                for rep in 0..self.repeat {
                    info!(version = %version, query = %query.name, repetition = rep, "running query");

                    match executor.run_cell(version, query) {
                        Ok(m) => {
                            info!(
                                version = %version,
                                query = %query.name,
                                wall = ?m.wall,
                                memory_bytes = m.memory_bytes,
                                "finished query"
                            );
                            matrix.record(v, q, m);
                        }
                        Err(e) => match self.policy {
                            ErrorPolicy::FailFast => {
                                return Err(OrchestrationError::CellFailed {
                                    version: version.clone(),
                                    query: query.name.clone(),
                                    repetition: rep,
                                    source: e,
                                });
                            }
                            ErrorPolicy::Continue => {
                                warn!(
                                    version = %version,
                                    query = %query.name,
                                    repetition = rep,
                                    error = %e,
                                    "query failed, continuing"
                                );
                                matrix.record_failure(v, q, e.to_string());
                            }
                        },
                    }
                }
            }
        }

        matrix.mark_completed();
        Ok(matrix)
    }
}
