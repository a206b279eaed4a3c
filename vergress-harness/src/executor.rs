//! Cell Execution
//!
//! Implements the engine's `CellExecutor` seam with real processes: start the
//! version's server binary, connect a query session, execute the workload
//! query with wall-clock timing around it, then stop the server and fold its
//! resource usage into the [`Measurement`]. The server instance is stopped on
//! every exit path (its Drop kills stragglers), so a failed connect or query
//! never leaks a process.

use crate::config::ServerConfig;
use crate::releases::Binary;
use crate::server::ServerInstance;
use crate::sql::SqlSession;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use vergress_core::{CellExecutor, ExecutionError, Measurement, Query};

/// Executor that measures queries against real server processes.
///
/// Stateless across invocations: every cell gets a fresh server instance and
/// a fresh session.
pub struct ProcessExecutor {
    binaries: HashMap<String, Binary>,
    repos: PathBuf,
    server: ServerConfig,
    startup_timeout: Duration,
}

impl ProcessExecutor {
    /// Build an executor over prepared binaries and a prepared repo path.
    pub fn new(
        binaries: HashMap<String, Binary>,
        repos: PathBuf,
        server: ServerConfig,
        startup_timeout: Duration,
    ) -> Self {
        Self {
            binaries,
            repos,
            server,
            startup_timeout,
        }
    }
}

impl CellExecutor for ProcessExecutor {
    fn run_cell(&mut self, version: &str, query: &Query) -> Result<Measurement, ExecutionError> {
        let binary = self.binaries.get(version).ok_or_else(|| {
            ExecutionError::start(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no prepared binary for version {version}"),
            ))
        })?;

        let instance = ServerInstance::start(
            &binary.path,
            &self.repos,
            &self.server,
            self.startup_timeout,
        )
        .map_err(ExecutionError::start)?;

        // From here on an early return drops `instance`, which kills the server
        let mut session =
            SqlSession::connect(instance.endpoint(), &self.server.user, &self.server.dbname)
                .map_err(ExecutionError::connect)?;

        let start = Instant::now();
        let rows = session.execute(query).map_err(ExecutionError::execute)?;
        let wall = start.elapsed();

        session.disconnect();
        let usage = instance.stop().map_err(ExecutionError::stop)?;

        info!(
            version = %version,
            query = %query.name,
            wall = ?wall,
            rows,
            memory_bytes = usage.max_memory_bytes,
            "measured run complete"
        );

        Ok(Measurement {
            wall,
            user: usage.user,
            sys: usage.sys,
            memory_bytes: usage.max_memory_bytes,
            rows,
        })
    }
}
