//! Workload Repository Provisioning
//!
//! Materializes the configured repository set under the workdir. Missing
//! repositories are cloned bare via the `git` CLI; existing clones are left
//! untouched so repeated runs measure the same data.

use crate::config::ReposConfig;
use crate::releases::PrepareError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// The workload repository set.
pub struct Repositories {
    config: ReposConfig,
}

impl Repositories {
    /// Build the repository set from config.
    pub fn new(config: ReposConfig) -> Self {
        Self { config }
    }

    /// Ensure every configured repository exists under the workdir and return
    /// the workdir path the server is pointed at.
    pub fn prepare(&self) -> Result<PathBuf, PrepareError> {
        let workdir = PathBuf::from(&self.config.workdir);
        fs::create_dir_all(&workdir)?;

        for url in &self.config.urls {
            let dest = workdir.join(clone_dir_name(url));
            if dest.exists() {
                debug!(url = %url, "repository already present");
                continue;
            }
            info!(url = %url, dest = %dest.display(), "cloning repository");
            clone_bare(url, &dest)?;
        }

        Ok(workdir)
    }
}

/// Directory name for a clone: the last path segment, `.git` stripped.
fn clone_dir_name(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    last.trim_end_matches(".git").to_string()
}

fn clone_bare(url: &str, dest: &Path) -> Result<(), PrepareError> {
    let output = Command::new("git")
        .arg("clone")
        .arg("--bare")
        .arg(url)
        .arg(dest)
        .output()
        .map_err(PrepareError::Io)?;

    if !output.status.success() {
        return Err(PrepareError::Clone {
            url: url.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_dir_name() {
        assert_eq!(
            clone_dir_name("https://github.com/acme/workload.git"),
            "workload"
        );
        assert_eq!(clone_dir_name("https://github.com/acme/workload"), "workload");
        assert_eq!(clone_dir_name("https://github.com/acme/workload/"), "workload");
    }

    #[test]
    fn test_prepare_creates_workdir_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("repos");
        // Pre-create a "clone" so no git invocation happens for it
        fs::create_dir_all(workdir.join("workload")).unwrap();

        let repos = Repositories::new(ReposConfig {
            workdir: workdir.to_string_lossy().into_owned(),
            urls: vec!["https://github.com/acme/workload.git".into()],
        });
        let path = repos.prepare().unwrap();
        assert_eq!(path, workdir);
    }
}
