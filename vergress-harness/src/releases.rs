//! Server Binary Provisioning
//!
//! Resolves each configured version to a runnable binary. Versions are either
//! GitHub release tags (the asset matching the configured platform pattern is
//! downloaded into the cache directory and unpacked if it is an archive) or
//! `local:<path>` entries pointing at an already-built binary.

use crate::config::BinariesConfig;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Provisioning of a repository or binary failed. Not retried; aborts the
/// whole run.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Release metadata lookup failed
    #[error("release lookup for {version} failed: {source}")]
    Lookup {
        /// Version whose release was requested
        version: String,
        /// HTTP failure
        #[source]
        source: reqwest::Error,
    },
    /// No asset of the release matched the platform pattern
    #[error("no release asset matching {pattern:?} for {version}")]
    NoAsset {
        /// Version whose release was inspected
        version: String,
        /// Configured asset pattern
        pattern: String,
    },
    /// Asset download failed
    #[error("download of {url} failed: {source}")]
    Download {
        /// Asset URL
        url: String,
        /// HTTP failure
        #[source]
        source: reqwest::Error,
    },
    /// A `local:` version points at a missing file
    #[error("local binary {0} does not exist")]
    MissingLocal(PathBuf),
    /// Cloning a workload repository failed
    #[error("git clone of {url} failed: {detail}")]
    Clone {
        /// Repository URL
        url: String,
        /// Captured git stderr or exit status
        detail: String,
    },
    /// Unpacking a downloaded archive failed
    #[error("extraction of {archive} failed: {detail}")]
    Extract {
        /// Archive path
        archive: String,
        /// Captured tar stderr or exit status
        detail: String,
    },
    /// The downloaded archive did not contain the expected binary
    #[error("no {name} binary inside {asset}")]
    BinaryNotFound {
        /// Downloaded asset path
        asset: String,
        /// Binary file name that was expected
        name: String,
    },
    /// Filesystem failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A runnable server binary for one version.
#[derive(Debug, Clone)]
pub struct Binary {
    /// Version identifier this binary implements
    pub version: String,
    /// Path to the executable
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Release {
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

fn pick_asset<'a>(assets: &'a [Asset], pattern: &str) -> Option<&'a Asset> {
    assets.iter().find(|a| a.name.contains(pattern))
}

/// Turn a downloaded asset into the executable at `dest`.
///
/// Release assets arrive as `.tar.gz` tarballs, bare `.gz` files, or plain
/// binaries. The asset file itself is removed once the binary is in place.
fn install_binary(download: &Path, dest: &Path) -> Result<(), PrepareError> {
    let asset = download
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if asset.ends_with(".tar.gz") || asset.ends_with(".tgz") {
        extract_tarball(download, dest)?;
    } else if asset.ends_with(".gz") {
        let mut decoder = GzDecoder::new(fs::File::open(download)?);
        let mut file = fs::File::create(dest)?;
        io::copy(&mut decoder, &mut file)?;
    } else if download != dest {
        fs::rename(download, dest)?;
    }

    if download != dest && download.exists() {
        fs::remove_file(download)?;
    }
    fs::set_permissions(dest, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

fn extract_tarball(archive: &Path, dest: &Path) -> Result<(), PrepareError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let output = Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dir)
        .output()
        .map_err(|source| PrepareError::Extract {
            archive: archive.display().to_string(),
            detail: source.to_string(),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            output.status.to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(PrepareError::Extract {
            archive: archive.display().to_string(),
            detail,
        });
    }

    if dest.is_file() {
        return Ok(());
    }
    // Tarballs often wrap the binary in a top-level directory.
    let name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let nested = entry.path().join(&name);
            if nested.is_file() {
                fs::rename(nested, dest)?;
                return Ok(());
            }
        }
    }
    Err(PrepareError::BinaryNotFound {
        asset: archive.display().to_string(),
        name: name.to_string_lossy().into_owned(),
    })
}

/// GitHub-releases binary source.
pub struct Releases {
    client: reqwest::blocking::Client,
    config: BinariesConfig,
}

impl Releases {
    /// Build a release source from the binaries config.
    pub fn new(config: BinariesConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }

    /// Resolve `version` to a runnable binary, downloading it if needed.
    ///
    /// `local:<path>` versions bypass the release lookup entirely. Downloads
    /// are cached under `<cache_dir>/<version>/` and skipped when the binary
    /// is already present.
    pub fn prepare(&self, version: &str) -> Result<Binary, PrepareError> {
        if let Some(path) = version.strip_prefix("local:") {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(PrepareError::MissingLocal(path));
            }
            debug!(version = %version, path = %path.display(), "using local binary");
            return Ok(Binary {
                version: version.to_string(),
                path,
            });
        }

        let dest = PathBuf::from(&self.config.cache_dir)
            .join(version)
            .join(&self.config.github_repo);
        if dest.is_file() {
            debug!(version = %version, "binary already cached");
            return Ok(Binary {
                version: version.to_string(),
                path: dest,
            });
        }

        let release = self.lookup(version)?;
        let asset = pick_asset(&release.assets, &self.config.asset_pattern).ok_or_else(|| {
            PrepareError::NoAsset {
                version: version.to_string(),
                pattern: self.config.asset_pattern.clone(),
            }
        })?;

        info!(version = %version, asset = %asset.name, "downloading release binary");
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let download = dest.with_file_name(&asset.name);
        let mut response = self
            .request(&asset.browser_download_url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| PrepareError::Download {
                url: asset.browser_download_url.clone(),
                source,
            })?;
        let mut file = fs::File::create(&download)?;
        io::copy(&mut response, &mut file)?;
        drop(file);

        install_binary(&download, &dest)?;

        Ok(Binary {
            version: version.to_string(),
            path: dest,
        })
    }

    fn lookup(&self, version: &str) -> Result<Release, PrepareError> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/releases/tags/{}",
            self.config.github_org, self.config.github_repo, version
        );
        self.request(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<Release>())
            .map_err(|source| PrepareError::Lookup {
                version: version.to_string(),
                source,
            })
    }

    fn request(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let mut builder = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, "vergress");
        if let Some(token) = &self.config.token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("token {token}"));
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pick_asset_by_pattern() {
        let assets = vec![
            Asset {
                name: "server_v1_darwin_arm64.tar.gz".into(),
                browser_download_url: "https://example.com/darwin".into(),
            },
            Asset {
                name: "server_v1_linux_amd64.tar.gz".into(),
                browser_download_url: "https://example.com/linux".into(),
            },
        ];
        let picked = pick_asset(&assets, "linux_amd64").unwrap();
        assert_eq!(picked.browser_download_url, "https://example.com/linux");
        assert!(pick_asset(&assets, "windows").is_none());
    }

    #[test]
    fn test_local_version_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("server");
        writeln!(fs::File::create(&bin).unwrap(), "#!/bin/sh").unwrap();

        let releases = Releases::new(BinariesConfig::default());
        let binary = releases
            .prepare(&format!("local:{}", bin.display()))
            .unwrap();
        assert_eq!(binary.path, bin);
    }

    #[test]
    fn test_local_version_missing_file() {
        let releases = Releases::new(BinariesConfig::default());
        let err = releases.prepare("local:/does/not/exist").unwrap_err();
        assert!(matches!(err, PrepareError::MissingLocal(_)));
    }

    #[test]
    fn test_install_raw_asset_moved_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let download = dir.path().join("server_v1_linux_amd64");
        fs::write(&download, b"payload").unwrap();

        let dest = dir.path().join("server");
        install_binary(&download, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(fs::metadata(&dest).unwrap().permissions().mode() & 0o100 != 0);
        assert!(!download.exists());
    }

    #[test]
    fn test_install_gz_asset() {
        let dir = tempfile::tempdir().unwrap();
        let download = dir.path().join("server_v1_linux_amd64.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            fs::File::create(&download).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"payload").unwrap();
        encoder.finish().unwrap();

        let dest = dir.path().join("server");
        install_binary(&download, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(fs::metadata(&dest).unwrap().permissions().mode() & 0o100 != 0);
        assert!(!download.exists());
    }

    #[test]
    fn test_install_tarball_with_nested_binary() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("pkg")).unwrap();
        fs::write(src.path().join("pkg").join("server"), b"payload").unwrap();

        let cache = tempfile::tempdir().unwrap();
        let download = cache.path().join("server_v1_linux_amd64.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&download)
            .arg("-C")
            .arg(src.path())
            .arg("pkg")
            .status()
            .unwrap();
        assert!(status.success());

        let dest = cache.path().join("server");
        install_binary(&download, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(fs::metadata(&dest).unwrap().permissions().mode() & 0o100 != 0);
        assert!(!download.exists());
    }

    #[test]
    fn test_install_tarball_without_expected_binary() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("README"), b"docs only").unwrap();

        let cache = tempfile::tempdir().unwrap();
        let download = cache.path().join("server_v1_linux_amd64.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&download)
            .arg("-C")
            .arg(src.path())
            .arg("README")
            .status()
            .unwrap();
        assert!(status.success());

        let err = install_binary(&download, &cache.path().join("server")).unwrap_err();
        assert!(matches!(err, PrepareError::BinaryNotFound { .. }));
    }

    #[test]
    fn test_cached_binary_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let config = BinariesConfig {
            github_repo: "server".into(),
            cache_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let cached = dir.path().join("v1.0.0").join("server");
        fs::create_dir_all(cached.parent().unwrap()).unwrap();
        fs::File::create(&cached).unwrap();

        // No network involved: the cached file short-circuits
        let releases = Releases::new(config);
        let binary = releases.prepare("v1.0.0").unwrap();
        assert_eq!(binary.path, cached);
    }
}
