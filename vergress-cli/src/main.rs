//! Vergress CLI
//!
//! Wires configuration and command-line overrides into the harness: prepare
//! repositories and binaries, fill the run matrix, print the comparison
//! report. Exit code 0 means every comparison passed, 1 means a regression
//! was detected, 2 means the run itself failed.

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vergress_core::{ErrorPolicy, Selector};
use vergress_harness::{Harness, HarnessConfig};

/// Cross-version performance-regression harness
#[derive(Parser, Debug)]
#[command(name = "vergress")]
#[command(author, version, about = "Vergress - cross-version performance-regression harness")]
struct Cli {
    /// Path to vergress.toml (discovered by walking up when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Version identifiers to test, oldest first; repeat the flag per version
    /// (overrides the config's version list)
    #[arg(long = "versions", value_name = "VERSION")]
    versions: Vec<String>,

    /// Repetitions per (version, query) cell
    #[arg(long)]
    repeat: Option<i64>,

    /// Regression tolerance percentage
    #[arg(long)]
    threshold: Option<f64>,

    /// Representative-run selection: "fastest" or "median"
    #[arg(long)]
    selector: Option<String>,

    /// Record per-cell failures and keep going instead of aborting the run
    /// on the first execution error
    #[arg(long)]
    continue_on_error: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", HarnessConfig::default_toml());
        return Ok(true);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HarnessConfig::discover().unwrap_or_default(),
    };

    if !cli.versions.is_empty() {
        config.run.versions = cli.versions.clone();
    }
    if let Some(repeat) = cli.repeat {
        config.run.repeat = repeat;
    }
    if let Some(threshold) = cli.threshold {
        config.run.threshold_pct = threshold;
    }
    if let Some(selector) = &cli.selector {
        config.run.selector = match selector.as_str() {
            "fastest" => Selector::Fastest,
            "median" => Selector::Median,
            other => bail!("unknown selector {other:?}, expected \"fastest\" or \"median\""),
        };
    }
    if cli.continue_on_error {
        config.run.error_policy = ErrorPolicy::Continue;
    }

    if config.run.versions.is_empty() {
        bail!("no versions configured; pass --versions or set [run] versions in vergress.toml");
    }

    info!(
        versions = ?config.run.versions,
        repeat = config.run.effective_repeat(),
        threshold_pct = config.run.threshold_pct,
        policy = ?config.run.error_policy,
        "starting regression run"
    );

    let mut harness = Harness::new(config);
    harness.prepare().context("provisioning failed")?;
    let matrix = harness.run().context("orchestration failed")?;
    let passed = harness.get_results(&matrix)?;
    Ok(passed)
}
