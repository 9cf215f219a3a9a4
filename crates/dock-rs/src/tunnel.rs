//! SSH tunnels to remote Docker hosts
//!
//! When the resolved endpoint is an `ssh://` URL, the Docker socket of the
//! remote machine is forwarded to a local unix socket with
//! `ssh -L <local>:/var/run/docker.sock <host> -N` and the client connects to
//! that local socket instead.

use crate::error::{DockError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};

/// Socket path of the Docker daemon on the remote side
const REMOTE_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Name of the forwarded socket inside the tunnel's temp directory
const LOCAL_SOCKET_NAME: &str = "dockerhost.sock";

/// Decides whether an endpoint needs a tunnel and creates it
#[async_trait]
pub trait Tunneler: Send + Sync {
    /// Returns `Ok(None)` when the endpoint is reachable directly
    async fn open(&self, endpoint: &str) -> Result<Option<Tunnel>>;
}

/// A running tunnel: the forwarding process plus its local socket
#[derive(Debug)]
pub struct Tunnel {
    socket_path: PathBuf,
    process: Child,
    // Removed (with the socket) when the tunnel is dropped
    _dir: Option<TempDir>,
}

impl Tunnel {
    pub(crate) fn new(socket_path: PathBuf, process: Child, dir: Option<TempDir>) -> Self {
        Self {
            socket_path,
            process,
            _dir: dir,
        }
    }

    /// Local socket the tunnel listens on
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Endpoint URL to hand to the Docker client
    pub fn endpoint(&self) -> String {
        format!("unix://{}", self.socket_path.display())
    }

    /// Stop the forwarding process and clean up the socket directory
    pub async fn close(mut self) -> Result<()> {
        if self.process.try_wait()?.is_none() {
            self.process
                .start_kill()
                .map_err(|e| DockError::Tunnel(format!("failed to stop ssh: {}", e)))?;
            self.process.wait().await?;
        }
        tracing::debug!(socket = %self.socket_path.display(), "SSH tunnel closed");
        Ok(())
    }
}

/// Remote host parsed from an `ssh://` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// `user@host` or `host`
    pub destination: String,
    pub port: Option<u16>,
}

impl SshTarget {
    /// Parse an endpoint URL, returning `None` for anything but `ssh://`
    pub fn parse(endpoint: &str) -> Option<Self> {
        let rest = endpoint.strip_prefix("ssh://")?;
        // Drop any path component (ssh://host/some/path)
        let authority = rest.split('/').next().unwrap_or(rest);
        if authority.is_empty() {
            return None;
        }

        let (user, host_port) = match authority.rsplit_once('@') {
            Some((user, host_port)) => (Some(user), host_port),
            None => (None, authority),
        };
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (host_port, None),
            },
            None => (host_port, None),
        };

        let destination = match user {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        };
        Some(Self { destination, port })
    }

    fn ssh_args(&self, local_socket: &Path) -> Vec<String> {
        let mut args = vec![
            "-L".to_string(),
            format!("{}:{}", local_socket.display(), REMOTE_DOCKER_SOCKET),
        ];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(self.destination.clone());
        args.push("-N".to_string());
        args
    }
}

/// Creates tunnels by spawning the system `ssh` binary
#[derive(Debug, Clone)]
pub struct SshTunneler {
    program: String,
    startup_timeout: Duration,
}

impl Default for SshTunneler {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl SshTunneler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how long to wait for the forwarded socket to accept connections
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    async fn wait_for_socket(&self, process: &mut Child, socket: &Path) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.startup_timeout;
        loop {
            if let Some(status) = process.try_wait()? {
                return Err(DockError::Tunnel(format!(
                    "ssh exited before the tunnel was ready ({})",
                    status
                )));
            }
            if socket_accepts(socket).await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DockError::Tunnel(format!(
                    "timed out waiting for {}",
                    socket.display()
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(unix)]
async fn socket_accepts(socket: &Path) -> bool {
    tokio::net::UnixStream::connect(socket).await.is_ok()
}

#[cfg(not(unix))]
async fn socket_accepts(_socket: &Path) -> bool {
    false
}

#[async_trait]
impl Tunneler for SshTunneler {
    async fn open(&self, endpoint: &str) -> Result<Option<Tunnel>> {
        let Some(target) = SshTarget::parse(endpoint) else {
            return Ok(None);
        };

        let dir = tempfile::Builder::new()
            .prefix("dock-pilot-sshtunnel-")
            .tempdir()?;
        let socket_path = dir.path().join(LOCAL_SOCKET_NAME);

        tracing::info!(destination = %target.destination, socket = %socket_path.display(), "Creating SSH tunnel");

        let mut process = Command::new(&self.program)
            .args(target.ssh_args(&socket_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DockError::Tunnel(format!("failed to spawn {}: {}", self.program, e)))?;

        if let Err(e) = self.wait_for_socket(&mut process, &socket_path).await {
            let _ = process.start_kill();
            let _ = process.wait().await;
            return Err(e);
        }

        Ok(Some(Tunnel::new(socket_path, process, Some(dir))))
    }
}
