//! Harness Facade
//!
//! Ties provisioning, execution and comparison together behind the three
//! calls a runner needs: `prepare` (repositories + binaries), `run` (fill the
//! matrix) and `get_results` (comparison report + verdict). The matrix is an
//! explicit value handed back by `run` rather than hidden harness state, so
//! the comparison pass can also be replayed against recorded matrices.

use crate::config::HarnessConfig;
use crate::executor::ProcessExecutor;
use crate::metrics::{PushClient, ReportingExecutor};
use crate::releases::{Binary, PrepareError, Releases};
use crate::repos::Repositories;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use vergress_core::{
    ComparisonReport, ContractViolation, ErrorPolicy, Orchestrator, OrchestrationError, Query,
    RunMatrix, compare_all,
};

/// Failures surfaced by the harness facade.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Provisioning failed
    #[error(transparent)]
    Prepare(#[from] PrepareError),
    /// The orchestration loop aborted
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
    /// `run` was called before `prepare` provisioned this version's binary.
    /// A programming error in the caller, not an environmental failure.
    #[error("version {0} has no prepared binary; was prepare() called?")]
    NotPrepared(String),
    /// `run` was called before `prepare` provisioned the repositories
    #[error("repositories not prepared; was prepare() called?")]
    ReposNotPrepared,
    /// A config value failed validation
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The regression harness: configuration plus provisioned state.
pub struct Harness {
    config: HarnessConfig,
    queries: Vec<Query>,
    binaries: HashMap<String, Binary>,
    repos_path: Option<PathBuf>,
}

impl Harness {
    /// Build a harness from configuration. Nothing is provisioned yet.
    pub fn new(config: HarnessConfig) -> Self {
        let queries = config.effective_queries();
        Self {
            config,
            queries,
            binaries: HashMap::new(),
            repos_path: None,
        }
    }

    /// The workload queries this harness will run.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Provision workload repositories and one binary per configured version.
    pub fn prepare(&mut self) -> Result<(), HarnessError> {
        info!("preparing workload repositories");
        let repos = Repositories::new(self.config.repos.clone());
        self.repos_path = Some(repos.prepare()?);

        info!("preparing server binaries");
        let releases = Releases::new(self.config.binaries.clone());
        for version in &self.config.run.versions {
            let binary = releases.prepare(version)?;
            self.binaries.insert(version.clone(), binary);
        }
        Ok(())
    }

    /// Execute the full version × query × repetition matrix.
    ///
    /// Every configured version must have a prepared binary; violating that
    /// fails loudly before any cell runs rather than producing a partial
    /// matrix.
    pub fn run(&mut self) -> Result<RunMatrix, HarnessError> {
        let repos = self
            .repos_path
            .clone()
            .ok_or(HarnessError::ReposNotPrepared)?;
        for version in &self.config.run.versions {
            if !self.binaries.contains_key(version) {
                return Err(HarnessError::NotPrepared(version.clone()));
            }
        }

        let startup_timeout = HarnessConfig::parse_duration(&self.config.server.startup_timeout)
            .map_err(|e| HarnessError::Config(e.to_string()))?;
        let repeat = self.config.run.effective_repeat();

        let executor = ProcessExecutor::new(
            self.binaries.clone(),
            repos,
            self.config.server.clone(),
            startup_timeout,
        );
        let push = (!self.config.push.address.is_empty())
            .then(|| PushClient::new(self.config.push.clone(), self.config.ci.clone()));
        let progress = self.progress_bar(repeat);
        let mut executor = ReportingExecutor::new(executor, push, Some(progress.clone()));

        let orchestrator = Orchestrator::new(repeat, self.config.run.error_policy);
        let result = orchestrator.run(&mut executor, &self.config.run.versions, &self.queries);
        match &result {
            Ok(_) => progress.finish_with_message("Complete"),
            Err(_) => progress.abandon_with_message("Aborted"),
        }
        Ok(result?)
    }

    /// Run the comparison pass over a completed matrix, print the report and
    /// return the overall verdict.
    pub fn get_results(&self, matrix: &RunMatrix) -> Result<bool, ContractViolation> {
        let report = self.build_report(matrix)?;
        print!("{}", report.render());
        Ok(report.passed)
    }

    /// Comparison pass without printing, for callers that render elsewhere.
    pub fn build_report(&self, matrix: &RunMatrix) -> Result<ComparisonReport, ContractViolation> {
        compare_all(
            matrix,
            self.config.run.threshold_pct,
            self.config.run.selector,
        )
    }

    fn progress_bar(&self, repeat: usize) -> ProgressBar {
        let total = self.config.run.versions.len() * self.queries.len() * repeat;
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }

    /// Error policy in effect, for logging at startup.
    pub fn error_policy(&self) -> ErrorPolicy {
        self.config.run.error_policy
    }
}
