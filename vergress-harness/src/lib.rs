#![warn(missing_docs)]
//! Vergress Harness - Provisioning and Measured Execution
//!
//! Everything the core engine treats as an external collaborator lives here:
//! - GitHub-release / local binary provisioning and workload repository
//!   cloning
//! - the measured server's process lifecycle (spawn, readiness probe,
//!   SIGTERM + `wait4` resource-usage capture)
//! - the SQL query runner session
//! - the Prometheus pushgateway reporter
//! - the [`Harness`] facade exposing `prepare` / `run` / `get_results`

mod config;
mod executor;
mod harness;
mod metrics;
mod queries;
mod releases;
mod repos;
mod server;
mod sql;

pub use config::{
    BinariesConfig, CiConfig, HarnessConfig, PushConfig, ReposConfig, RunConfig, ServerConfig,
};
pub use executor::ProcessExecutor;
pub use harness::{Harness, HarnessError};
pub use metrics::{Observation, PushClient, PushError, ReportingExecutor};
pub use queries::default_queries;
pub use releases::{Binary, PrepareError, Releases};
pub use repos::Repositories;
pub use server::{ServerError, ServerInstance};
pub use sql::{RunError, SqlSession};
