//! Query Runner
//!
//! A thin session around the SQL protocol the measured server speaks:
//! connect, execute one workload statement, report the rows produced,
//! disconnect. Timing happens in the executor around `execute`, never in
//! here.

use postgres::{Client, NoTls};
use thiserror::Error;
use vergress_core::Query;

/// A query failed to connect or execute.
#[derive(Debug, Error)]
pub enum RunError {
    /// Session establishment failed
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint the session targeted
        endpoint: String,
        /// Protocol-level failure
        #[source]
        source: postgres::Error,
    },
    /// Statement execution failed
    #[error("query {name} failed: {source}")]
    Execute {
        /// Name of the failed query
        name: String,
        /// Protocol-level failure
        #[source]
        source: postgres::Error,
    },
}

/// One live session against a running server instance.
pub struct SqlSession {
    client: Client,
}

impl SqlSession {
    /// Connect to a server at `host:port`.
    pub fn connect(endpoint: &str, user: &str, dbname: &str) -> Result<Self, RunError> {
        let (host, port) = endpoint.split_once(':').unwrap_or((endpoint, "5432"));
        let params = format!("host={host} port={port} user={user} dbname={dbname}");
        let client = Client::connect(&params, NoTls).map_err(|source| RunError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self { client })
    }

    /// Execute one workload query and return the number of rows produced.
    pub fn execute(&mut self, query: &Query) -> Result<u64, RunError> {
        let rows = self
            .client
            .query(query.statement.as_str(), &[])
            .map_err(|source| RunError::Execute {
                name: query.name.clone(),
                source,
            })?;
        Ok(rows.len() as u64)
    }

    /// Close the session. Dropping the session disconnects as well; this
    /// exists so the executor can release it at a defined point.
    pub fn disconnect(self) {}
}
