//! Server Process Lifecycle
//!
//! Spawns one instance of a measured server binary per cell execution, waits
//! for it to accept TCP connections, and on stop reaps it with `wait4` so the
//! kernel's resource-usage counters (user/sys CPU time, peak RSS) come back
//! with the exit. Drop kills an instance that was never stopped, so a failed
//! query never leaks a server process.

use crate::config::ServerConfig;
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use vergress_core::ResourceUsage;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failures of the measured server process itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Spawning the binary failed
    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),
    /// The server exited before it ever accepted a connection
    #[error("server exited before accepting connections ({status})")]
    EarlyExit {
        /// Exit status of the dead server
        status: std::process::ExitStatus,
    },
    /// The server never started listening within the startup timeout
    #[error("server did not accept connections on {endpoint} within {timeout:?}")]
    StartupTimeout {
        /// Endpoint that was probed
        endpoint: String,
        /// Configured startup timeout
        timeout: Duration,
    },
    /// Reaping the server failed
    #[error("wait4 on server pid {pid} failed: {source}")]
    Wait {
        /// Pid that was waited on
        pid: u32,
        /// OS error from wait4
        source: std::io::Error,
    },
    /// `stop` was called on an already-stopped instance
    #[error("server instance already stopped")]
    AlreadyStopped,
}

/// Substitute `{repos}` and `{port}` placeholders in the arg template.
fn substitute_args(template: &[String], repos: &Path, port: u16) -> Vec<String> {
    let repos = repos.to_string_lossy();
    template
        .iter()
        .map(|a| {
            a.replace("{repos}", repos.as_ref())
                .replace("{port}", &port.to_string())
        })
        .collect()
}

fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn rusage_snapshot(rusage: &libc::rusage) -> ResourceUsage {
    let timeval = |tv: &libc::timeval| {
        Duration::new(tv.tv_sec.max(0) as u64, (tv.tv_usec.max(0) as u32) * 1000)
    };
    ResourceUsage {
        user: timeval(&rusage.ru_utime),
        sys: timeval(&rusage.ru_stime),
        // ru_maxrss is reported in KiB on Linux
        max_memory_bytes: (rusage.ru_maxrss.max(0) as u64) * 1024,
    }
}

/// A running instance of a measured server binary.
#[derive(Debug)]
pub struct ServerInstance {
    child: Option<Child>,
    endpoint: String,
}

impl ServerInstance {
    /// Spawn the binary pointed at the repository path and wait until it
    /// accepts TCP connections on the configured port.
    pub fn start(
        binary: &Path,
        repos: &Path,
        config: &ServerConfig,
        startup_timeout: Duration,
    ) -> Result<Self, ServerError> {
        let args = substitute_args(&config.args, repos, config.port);
        debug!(binary = %binary.display(), ?args, "starting server");

        let child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(ServerError::Spawn)?;

        let mut instance = Self {
            child: Some(child),
            endpoint: format!("127.0.0.1:{}", config.port),
        };
        // On readiness failure the instance drops here and the child is killed
        instance.wait_ready(startup_timeout)?;
        Ok(instance)
    }

    /// Endpoint the server listens on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), ServerError> {
        let addr: SocketAddr = match self.endpoint.parse() {
            Ok(addr) => addr,
            Err(_) => {
                return Err(ServerError::StartupTimeout {
                    endpoint: self.endpoint.clone(),
                    timeout,
                });
            }
        };
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(ServerError::EarlyExit { status });
                }
            }
            if TcpStream::connect_timeout(&addr, READY_POLL_INTERVAL).is_ok() {
                debug!(endpoint = %self.endpoint, "server ready");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ServerError::StartupTimeout {
                    endpoint: self.endpoint.clone(),
                    timeout,
                });
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }

    /// Stop the server (SIGTERM) and return the kernel's resource-usage
    /// snapshot for its whole lifetime.
    pub fn stop(mut self) -> Result<ResourceUsage, ServerError> {
        let child = self.child.take().ok_or(ServerError::AlreadyStopped)?;
        let pid = child.id();

        // Delivery failure means the process is already gone; wait4 below
        // still reaps it either way.
        let _ = send_sigterm(pid);

        let mut status: libc::c_int = 0;
        let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::wait4(pid as libc::pid_t, &mut status, 0, &mut rusage) };
        if ret == -1 {
            return Err(ServerError::Wait {
                pid,
                source: std::io::Error::last_os_error(),
            });
        }

        let usage = rusage_snapshot(&rusage);
        debug!(
            pid,
            user = ?usage.user,
            sys = ?usage.sys,
            max_memory_bytes = usage.max_memory_bytes,
            "server stopped"
        );
        Ok(usage)
    }
}

impl Drop for ServerInstance {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                // SIGTERM first, brief grace, then SIGKILL
                let _ = send_sigterm(child.id());
                std::thread::sleep(Duration::from_millis(50));
                if matches!(child.try_wait(), Ok(None)) {
                    let _ = child.kill();
                }
            }
            let _ = child.wait();
        }
    }
}
