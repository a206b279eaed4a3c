//! Configuration loading from vergress.toml
//!
//! Harness configuration lives in a `vergress.toml` file, discovered by
//! walking up from the current directory. Every section has serde defaults so
//! a minimal file only needs the version list.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vergress_core::{DEFAULT_THRESHOLD_PCT, ErrorPolicy, Query, Selector};

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    /// Run matrix configuration
    #[serde(default)]
    pub run: RunConfig,
    /// Workload queries; empty means the built-in default set
    #[serde(default)]
    pub queries: Vec<Query>,
    /// Server binary provisioning
    #[serde(default)]
    pub binaries: BinariesConfig,
    /// Workload repository provisioning
    #[serde(default)]
    pub repos: ReposConfig,
    /// Measured server process settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Prometheus pushgateway settings (disabled when address is empty)
    #[serde(default)]
    pub push: PushConfig,
    /// CI build metadata attached to pushed metrics as labels
    #[serde(default)]
    pub ci: CiConfig,
}

/// Run matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Version identifiers in comparison order (oldest first)
    #[serde(default)]
    pub versions: Vec<String>,
    /// Repetitions per (version, query) cell; non-positive means 1
    #[serde(default = "default_repeat")]
    pub repeat: i64,
    /// Regression tolerance in percent
    #[serde(default = "default_threshold")]
    pub threshold_pct: f64,
    /// Representative-run selection: "fastest" or "median"
    #[serde(default)]
    pub selector: Selector,
    /// Failure policy: "fail-fast" or "continue"
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
            repeat: default_repeat(),
            threshold_pct: default_threshold(),
            selector: Selector::default(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Effective repetition count (non-positive values default to 1).
    pub fn effective_repeat(&self) -> usize {
        if self.repeat < 1 { 1 } else { self.repeat as usize }
    }
}

fn default_repeat() -> i64 {
    1
}
fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD_PCT
}

/// Server binary provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinariesConfig {
    /// GitHub organization of the release repository
    #[serde(default)]
    pub github_org: String,
    /// GitHub repository name
    #[serde(default)]
    pub github_repo: String,
    /// API token for private repositories or rate limits
    #[serde(default)]
    pub token: Option<String>,
    /// Substring used to pick the release asset for this platform
    #[serde(default = "default_asset_pattern")]
    pub asset_pattern: String,
    /// Directory release binaries are cached in
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            github_org: String::new(),
            github_repo: String::new(),
            token: None,
            asset_pattern: default_asset_pattern(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_asset_pattern() -> String {
    "linux_amd64".to_string()
}
fn default_cache_dir() -> String {
    "target/vergress/binaries".to_string()
}

/// Workload repository provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReposConfig {
    /// Directory repositories are cloned into
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Repository URLs to clone (bare) if missing
    #[serde(default)]
    pub urls: Vec<String>,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            urls: Vec::new(),
        }
    }
}

fn default_workdir() -> String {
    "target/vergress/repos".to_string()
}

/// Measured server process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Arguments passed to the binary; `{repos}` and `{port}` are substituted
    #[serde(default = "default_server_args")]
    pub args: Vec<String>,
    /// TCP port the server is expected to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long to wait for the server to accept connections (e.g. "30s")
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: String,
    /// User for the query session
    #[serde(default = "default_user")]
    pub user: String,
    /// Database name for the query session
    #[serde(default = "default_dbname")]
    pub dbname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            args: default_server_args(),
            port: default_port(),
            startup_timeout: default_startup_timeout(),
            user: default_user(),
            dbname: default_dbname(),
        }
    }
}

fn default_server_args() -> Vec<String> {
    vec![
        "server".to_string(),
        "--directories".to_string(),
        "{repos}".to_string(),
        "--port".to_string(),
        "{port}".to_string(),
    ]
}
fn default_port() -> u16 {
    5433
}
fn default_startup_timeout() -> String {
    "30s".to_string()
}
fn default_user() -> String {
    "root".to_string()
}
fn default_dbname() -> String {
    "workload".to_string()
}

/// Prometheus pushgateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Pushgateway base address; empty disables metric push
    #[serde(default)]
    pub address: String,
    /// Job label for pushed metrics
    #[serde(default = "default_job")]
    pub job: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            job: default_job(),
        }
    }
}

fn default_job() -> String {
    "vergress".to_string()
}

/// CI build metadata attached to metrics as labels
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CiConfig {
    /// Branch under test
    #[serde(default)]
    pub branch: String,
    /// Commit under test
    #[serde(default)]
    pub commit: String,
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from the current
    /// directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("vergress.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Queries to run: the configured list, or the built-in default set.
    pub fn effective_queries(&self) -> Vec<Query> {
        if self.queries.is_empty() {
            crate::queries::default_queries()
        } else {
            self.queries.clone()
        }
    }

    /// Generate a default configuration as a TOML string
    pub fn default_toml() -> String {
        r#"# Vergress Configuration

[run]
# Version identifiers in comparison order (oldest first)
versions = []
# Repetitions per (version, query) cell
repeat = 1
# Regression tolerance in percent
threshold_pct = 10.0
# Representative-run selection: "fastest" or "median"
selector = "fastest"
# Failure policy: "fail-fast" or "continue"
error_policy = "fail-fast"

[binaries]
# GitHub release source for server binaries
github_org = ""
github_repo = ""
# Substring matching the release asset for this platform
asset_pattern = "linux_amd64"
# Download cache
cache_dir = "target/vergress/binaries"

[repos]
# Workload repositories are cloned (bare) into this directory
workdir = "target/vergress/repos"
urls = []

[server]
# Arguments passed to the measured binary; {repos} and {port} are substituted
args = ["server", "--directories", "{repos}", "--port", "{port}"]
port = 5433
# How long to wait for the server to accept connections
startup_timeout = "30s"
user = "root"
dbname = "workload"

[push]
# Prometheus pushgateway; empty disables metric push
address = ""
job = "vergress"

[ci]
branch = ""
commit = ""

# Override the built-in query set:
# [[queries]]
# name = "count_commits"
# statement = "SELECT count(*) FROM commits"
"#
        .to_string()
    }

    /// Parse a duration string (e.g. "30s", "500ms", "2m")
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let multiplier: f64 = match unit_part.to_lowercase().as_str() {
            "ms" => 0.001,
            "s" | "" => 1.0,
            "m" | "min" => 60.0,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_secs_f64(value * multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.run.effective_repeat(), 1);
        assert_eq!(config.run.threshold_pct, 10.0);
        assert_eq!(config.run.selector, Selector::Fastest);
        assert_eq!(config.run.error_policy, ErrorPolicy::FailFast);
        assert_eq!(config.server.port, 5433);
    }

    #[test]
    fn test_non_positive_repeat_defaults_to_one() {
        let mut config = HarnessConfig::default();
        config.run.repeat = 0;
        assert_eq!(config.run.effective_repeat(), 1);
        config.run.repeat = -3;
        assert_eq!(config.run.effective_repeat(), 1);
        config.run.repeat = 5;
        assert_eq!(config.run.effective_repeat(), 5);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            HarnessConfig::parse_duration("30s").unwrap(),
            Duration::from_secs(30)
        );
        assert_eq!(
            HarnessConfig::parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            HarnessConfig::parse_duration("2m").unwrap(),
            Duration::from_secs(120)
        );
        assert!(HarnessConfig::parse_duration("").is_err());
        assert!(HarnessConfig::parse_duration("5 parsecs").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [run]
            versions = ["v0.18.0", "v0.19.0"]
            repeat = 3
            selector = "median"
            error_policy = "continue"

            [[queries]]
            name = "count"
            statement = "SELECT count(*) FROM commits"
        "#;

        let config: HarnessConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.run.versions.len(), 2);
        assert_eq!(config.run.effective_repeat(), 3);
        assert_eq!(config.run.selector, Selector::Median);
        assert_eq!(config.run.error_policy, ErrorPolicy::Continue);
        assert_eq!(config.effective_queries().len(), 1);
        // Defaults still apply
        assert_eq!(config.run.threshold_pct, 10.0);
        assert_eq!(config.push.job, "vergress");
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = HarnessConfig::default_toml();
        let config: HarnessConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.run.threshold_pct, 10.0);
        assert!(!config.effective_queries().is_empty());
    }
}
