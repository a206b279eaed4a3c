//! Measurement Data Model
//!
//! A [`Measurement`] is the outcome of executing one query once against one
//! server binary: wall-clock time around the query, the CPU time and peak
//! memory the server process consumed, and the number of rows produced.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The outcome of a single query execution against a single server instance.
///
/// Created exactly once per executor invocation and immutable afterwards.
/// `user`/`sys` are measured independently from `wall` (OS resource counters
/// vs. wall clock) and are not required to sum to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Elapsed wall-clock time around the query execution
    pub wall: Duration,
    /// User-mode CPU time of the server process
    pub user: Duration,
    /// Kernel-mode CPU time of the server process
    pub sys: Duration,
    /// Peak resident memory of the server process, in bytes
    pub memory_bytes: u64,
    /// Rows produced by the query (sanity-check payload, never used for timing)
    pub rows: u64,
}

impl Measurement {
    /// Peak resident memory in MiB, for reporting and metrics push.
    pub fn memory_mib(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// OS resource-usage snapshot returned when a server instance is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage {
    /// User-mode CPU time
    pub user: Duration,
    /// Kernel-mode CPU time
    pub sys: Duration,
    /// Peak resident set size, in bytes
    pub max_memory_bytes: u64,
}

/// A named workload query.
///
/// `name` is unique within the configured query list and doubles as the
/// display key; the statement payload is opaque to the engine and only
/// interpreted by the query runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Unique display name
    pub name: String,
    /// Statement payload executed by the query runner
    pub statement: String,
}

impl Query {
    /// Build a query from name and statement.
    pub fn new(name: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statement: statement.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_mib() {
        let m = Measurement {
            wall: Duration::from_millis(100),
            user: Duration::from_millis(80),
            sys: Duration::from_millis(10),
            memory_bytes: 512 * 1024 * 1024,
            rows: 42,
        };
        assert_eq!(m.memory_mib(), 512.0);
    }

    #[test]
    fn test_cpu_components_independent_of_wall() {
        // user + sys may exceed wall (multi-threaded server); the model allows it
        let m = Measurement {
            wall: Duration::from_millis(100),
            user: Duration::from_millis(150),
            sys: Duration::from_millis(60),
            memory_bytes: 0,
            rows: 0,
        };
        assert!(m.user + m.sys > m.wall);
    }
}
