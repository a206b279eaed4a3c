//! Engine Error Taxonomy
//!
//! Three kinds of failure flow through the engine:
//!
//! - [`ExecutionError`] — one measured run failed at a specific stage
//!   (start / connect / execute). Recoverable in the sense that the caller
//!   decides the policy (fail-fast or continue-on-error).
//! - [`OrchestrationError`] — the orchestration loop aborted under the
//!   fail-fast policy; carries the cell that failed.
//! - [`ContractViolation`] — the engine was used incorrectly (empty selection
//!   pool, fewer than two versions, results requested before a completed run).
//!   Not an environmental failure: callers must treat it as fatal.

use thiserror::Error;

/// Stage of a measured run at which execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Starting the server instance
    Start,
    /// Establishing the query-protocol session
    Connect,
    /// Executing the query
    Execute,
    /// Stopping the instance / collecting resource usage
    Stop,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Start => write!(f, "start"),
            Stage::Connect => write!(f, "connect"),
            Stage::Execute => write!(f, "execute"),
            Stage::Stop => write!(f, "stop"),
        }
    }
}

/// A single measured run failed.
#[derive(Debug, Error)]
#[error("run failed at {stage} stage: {source}")]
pub struct ExecutionError {
    /// Stage that failed
    pub stage: Stage,
    /// Underlying cause
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ExecutionError {
    /// Failure while starting the server instance.
    pub fn start(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            stage: Stage::Start,
            source: Box::new(source),
        }
    }

    /// Failure while connecting the query session.
    pub fn connect(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            stage: Stage::Connect,
            source: Box::new(source),
        }
    }

    /// Failure while executing the query.
    pub fn execute(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            stage: Stage::Execute,
            source: Box::new(source),
        }
    }

    /// Failure while stopping the instance or reading resource usage.
    pub fn stop(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            stage: Stage::Stop,
            source: Box::new(source),
        }
    }
}

/// The orchestration loop aborted.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A cell failed under the fail-fast policy; the partial matrix is discarded.
    #[error("cell ({version}, {query}) repetition {repetition} failed: {source}")]
    CellFailed {
        /// Version whose cell failed
        version: String,
        /// Query name of the failed cell
        query: String,
        /// Zero-based repetition index
        repetition: usize,
        /// The execution failure
        #[source]
        source: ExecutionError,
    },
}

/// Incorrect use of the engine. Fatal by contract: these indicate a
/// programming error in the caller, not an environmental failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// A selection pool was empty (no successful runs in a cell).
    #[error("selection pool for ({version}, {query}) is empty")]
    EmptySelection {
        /// Version of the empty cell
        version: String,
        /// Query name of the empty cell
        query: String,
    },
    /// Comparison requires at least two versions.
    #[error("at least two versions are required for comparison, got {0}")]
    TooFewVersions(usize),
    /// Results were requested before a completed orchestration run.
    #[error("results requested before a completed run")]
    ResultsBeforeRun,
}
