//! Metrics Push
//!
//! Converts one [`Measurement`] into a fixed four-field observation and
//! pushes it to a Prometheus pushgateway in text exposition format. The
//! metric set is closed (wall, sys, user, memory), so there is no runtime
//! name lookup to fail. A push failure is reported and never affects the
//! comparison verdict.

use crate::config::{CiConfig, PushConfig};
use indicatif::ProgressBar;
use thiserror::Error;
use tracing::warn;
use vergress_core::{CellExecutor, ExecutionError, Measurement, Query};

const WALL_SECONDS: &str = "vergress_wall_seconds";
const SYS_SECONDS: &str = "vergress_sys_seconds";
const USER_SECONDS: &str = "vergress_user_seconds";
const MEMORY_MIB: &str = "vergress_memory_mib";

/// Metrics delivery failed.
#[derive(Debug, Error)]
#[error("failed to push metrics to {address}: {source}")]
pub struct PushError {
    /// Pushgateway address
    pub address: String,
    /// HTTP failure
    #[source]
    pub source: reqwest::Error,
}

/// One measurement flattened to the four pushed gauges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Wall-clock seconds
    pub wall_seconds: f64,
    /// Kernel CPU seconds
    pub sys_seconds: f64,
    /// User CPU seconds
    pub user_seconds: f64,
    /// Peak resident memory in MiB
    pub memory_mib: f64,
}

impl From<&Measurement> for Observation {
    fn from(m: &Measurement) -> Self {
        Self {
            wall_seconds: m.wall.as_secs_f64(),
            sys_seconds: m.sys.as_secs_f64(),
            user_seconds: m.user.as_secs_f64(),
            memory_mib: m.memory_mib(),
        }
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Pushgateway client carrying the CI labels attached to every observation.
pub struct PushClient {
    client: reqwest::blocking::Client,
    push: PushConfig,
    ci: CiConfig,
}

impl PushClient {
    /// Build a client from push and CI config.
    pub fn new(push: PushConfig, ci: CiConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            push,
            ci,
        }
    }

    /// Push one labeled observation.
    pub fn push(
        &self,
        version: &str,
        query: &str,
        obs: &Observation,
    ) -> Result<(), PushError> {
        let url = format!(
            "{}/metrics/job/{}",
            self.push.address.trim_end_matches('/'),
            self.push.job
        );
        let body = self.render_body(version, query, obs);
        self.client
            .post(&url)
            .body(body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| PushError {
                address: self.push.address.clone(),
                source,
            })?;
        Ok(())
    }

    fn render_body(&self, version: &str, query: &str, obs: &Observation) -> String {
        let labels = format!(
            "version=\"{}\",query=\"{}\",branch=\"{}\",commit=\"{}\"",
            escape_label(version),
            escape_label(query),
            escape_label(&self.ci.branch),
            escape_label(&self.ci.commit),
        );
        let mut body = String::new();
        for (name, value) in [
            (WALL_SECONDS, obs.wall_seconds),
            (SYS_SECONDS, obs.sys_seconds),
            (USER_SECONDS, obs.user_seconds),
            (MEMORY_MIB, obs.memory_mib),
        ] {
            body.push_str(&format!("# TYPE {name} gauge\n"));
            body.push_str(&format!("{name}{{{labels}}} {value}\n"));
        }
        body
    }
}

/// Decorator around a `CellExecutor` that pushes every successful measurement
/// and ticks the progress bar. Execution results pass through unchanged; a
/// failed push is logged and swallowed.
pub struct ReportingExecutor<E> {
    inner: E,
    push: Option<PushClient>,
    progress: Option<ProgressBar>,
}

impl<E> ReportingExecutor<E> {
    /// Wrap an executor with optional metrics push and progress reporting.
    pub fn new(inner: E, push: Option<PushClient>, progress: Option<ProgressBar>) -> Self {
        Self {
            inner,
            push,
            progress,
        }
    }
}

impl<E: CellExecutor> CellExecutor for ReportingExecutor<E> {
    fn run_cell(&mut self, version: &str, query: &Query) -> Result<Measurement, ExecutionError> {
        if let Some(pb) = &self.progress {
            pb.set_message(format!("{version}/{}", query.name));
        }
        let result = self.inner.run_cell(version, query);
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }

        if let (Ok(m), Some(push)) = (&result, &self.push) {
            if let Err(e) = push.push(version, &query.name, &Observation::from(m)) {
                warn!(error = %e, "metrics push failed");
            }
        }
        result
    }
}
