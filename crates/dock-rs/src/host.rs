//! Docker host resolution
//!
//! Decides which endpoint the client connects to, in decreasing precedence:
//!
//! 1. an explicit override (`DOCKER_HOST` or `--host`)
//! 2. the docker endpoint of the active context (`DOCKER_CONTEXT`, else the
//!    `currentContext` of the CLI config; `default` counts as no context)
//! 3. the default socket of the host operating system
//!
//! The chosen endpoint is then offered to a [`Tunneler`], which may replace
//! it with a local tunnel socket.

use crate::config::{CliConfig, ContextStore};
use crate::error::Result;
use crate::tunnel::{Tunnel, Tunneler};
use std::path::PathBuf;

pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";
pub const DOCKER_CONTEXT_ENV: &str = "DOCKER_CONTEXT";

/// Context name that always means "no context"
const DEFAULT_CONTEXT: &str = "default";

#[cfg(unix)]
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";
#[cfg(windows)]
pub const DEFAULT_DOCKER_HOST: &str = "npipe:////./pipe/docker_engine";

/// Inputs consulted while resolving the host
#[derive(Debug, Clone, Default)]
pub struct HostSources {
    /// Explicit endpoint override
    pub host_override: Option<String>,
    /// Explicit context name override
    pub context_override: Option<String>,
    /// Docker CLI configuration directory
    pub config_dir: PathBuf,
}

impl HostSources {
    /// Collect sources from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host_override: non_empty_env(DOCKER_HOST_ENV),
            context_override: non_empty_env(DOCKER_CONTEXT_ENV),
            config_dir: CliConfig::config_dir()?,
        })
    }

    /// Replace the host override when one is given
    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.host_override = Some(host);
        }
        self
    }

    /// Replace the context override when one is given
    pub fn with_context(mut self, context: Option<String>) -> Self {
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            self.context_override = Some(context);
        }
        self
    }

    /// Name of the active context, if any
    fn active_context(&self) -> Result<Option<String>> {
        let name = match &self.context_override {
            Some(name) => Some(name.clone()),
            None => CliConfig::load_from_dir(&self.config_dir)?.current_context,
        };
        Ok(name.filter(|n| !n.is_empty() && n != DEFAULT_CONTEXT))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Determine the endpoint to connect to, before any tunneling
pub fn determine_docker_host(sources: &HostSources) -> Result<String> {
    if let Some(host) = &sources.host_override {
        return Ok(host.clone());
    }

    let Some(context) = sources.active_context()? else {
        return Ok(DEFAULT_DOCKER_HOST.to_string());
    };

    let store = ContextStore::new(&sources.config_dir);
    let endpoint = store.docker_endpoint(&context)?;
    if endpoint.host.is_empty() {
        // A context created with `--docker "host="`; the CLI falls back to
        // the default host in that case
        tracing::debug!(%context, "Context has an empty host, using default");
        return Ok(DEFAULT_DOCKER_HOST.to_string());
    }

    Ok(endpoint.host)
}

/// Releases resources acquired during host resolution
///
/// Consumed by [`HostReleaser::release`], so it runs at most once.
#[derive(Debug, Default)]
pub struct HostReleaser {
    tunnel: Option<Tunnel>,
}

impl HostReleaser {
    /// Releaser for a direct endpoint
    pub fn noop() -> Self {
        Self::default()
    }

    /// Whether releasing would tear anything down
    pub fn has_tunnel(&self) -> bool {
        self.tunnel.is_some()
    }

    pub async fn release(self) -> Result<()> {
        match self.tunnel {
            Some(tunnel) => tunnel.close().await,
            None => Ok(()),
        }
    }
}

/// Endpoint to connect to plus the handle that must be released at shutdown
#[derive(Debug)]
pub struct ResolvedHost {
    pub endpoint: String,
    pub releaser: HostReleaser,
}

/// Resolve the endpoint and create a tunnel when the tunneler requires one
pub async fn resolve_host(sources: &HostSources, tunneler: &dyn Tunneler) -> Result<ResolvedHost> {
    let endpoint = determine_docker_host(sources)?;
    tracing::info!(%endpoint, "Resolved docker host");

    match tunneler.open(&endpoint).await? {
        Some(tunnel) => Ok(ResolvedHost {
            endpoint: tunnel.endpoint(),
            releaser: HostReleaser {
                tunnel: Some(tunnel),
            },
        }),
        None => Ok(ResolvedHost {
            endpoint,
            releaser: HostReleaser::noop(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{write_context, write_current_context};
    use crate::error::DockError;
    use crate::tunnel::SshTunneler;
    use async_trait::async_trait;

    fn sources(dir: &std::path::Path) -> HostSources {
        HostSources {
            config_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_override_wins_over_context() {
        let dir = tempfile::tempdir().unwrap();
        write_current_context(dir.path(), "remote");
        write_context(dir.path(), "remote", r#"{"docker":{"Host":"tcp://remote:2376"}}"#);

        let sources = sources(dir.path()).with_host(Some("tcp://override:2375".to_string()));
        assert_eq!(determine_docker_host(&sources).unwrap(), "tcp://override:2375");
    }

    #[test]
    fn test_no_context_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            determine_docker_host(&sources(dir.path())).unwrap(),
            DEFAULT_DOCKER_HOST
        );
    }

    #[test]
    fn test_default_context_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_current_context(dir.path(), "default");
        assert_eq!(
            determine_docker_host(&sources(dir.path())).unwrap(),
            DEFAULT_DOCKER_HOST
        );
    }

    #[test]
    fn test_current_context_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        write_current_context(dir.path(), "remote");
        write_context(dir.path(), "remote", r#"{"docker":{"Host":"tcp://remote:2376"}}"#);
        assert_eq!(
            determine_docker_host(&sources(dir.path())).unwrap(),
            "tcp://remote:2376"
        );
    }

    #[test]
    fn test_context_override_beats_config_file() {
        let dir = tempfile::tempdir().unwrap();
        write_current_context(dir.path(), "remote");
        write_context(dir.path(), "remote", r#"{"docker":{"Host":"tcp://remote:2376"}}"#);
        write_context(dir.path(), "other", r#"{"docker":{"Host":"ssh://other"}}"#);

        let sources = sources(dir.path()).with_context(Some("other".to_string()));
        assert_eq!(determine_docker_host(&sources).unwrap(), "ssh://other");
    }

    #[test]
    fn test_empty_context_host_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        write_context(dir.path(), "blank", r#"{"docker":{"Host":""}}"#);

        let sources = sources(dir.path()).with_context(Some("blank".to_string()));
        assert_eq!(determine_docker_host(&sources).unwrap(), DEFAULT_DOCKER_HOST);
    }

    #[test]
    fn test_missing_endpoint_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_context(dir.path(), "bare", "{}");

        let sources = sources(dir.path()).with_context(Some("bare".to_string()));
        assert!(matches!(
            determine_docker_host(&sources),
            Err(DockError::EndpointNotFound(_))
        ));
    }

    #[test]
    fn test_unloadable_context_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sources = sources(dir.path()).with_context(Some("ghost".to_string()));
        assert!(matches!(
            determine_docker_host(&sources),
            Err(DockError::ContextNotFound(_))
        ));
    }

    struct FailingTunneler;

    #[async_trait]
    impl Tunneler for FailingTunneler {
        async fn open(&self, _endpoint: &str) -> Result<Option<Tunnel>> {
            Err(DockError::Tunnel("no route".to_string()))
        }
    }

    #[tokio::test]
    async fn test_direct_endpoint_has_noop_releaser() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_host(&sources(dir.path()), &SshTunneler::new())
            .await
            .unwrap();
        assert_eq!(resolved.endpoint, DEFAULT_DOCKER_HOST);
        assert!(!resolved.releaser.has_tunnel());
        resolved.releaser.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_tunnel_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_host(&sources(dir.path()), &FailingTunneler).await;
        assert!(matches!(result, Err(DockError::Tunnel(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tunnel_rewrites_endpoint() {
        struct SleepTunneler;

        #[async_trait]
        impl Tunneler for SleepTunneler {
            async fn open(&self, _endpoint: &str) -> Result<Option<Tunnel>> {
                let child = tokio::process::Command::new("sleep")
                    .arg("30")
                    .kill_on_drop(true)
                    .spawn()?;
                Ok(Some(Tunnel::new(PathBuf::from("/tmp/t.sock"), child, None)))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_host(&sources(dir.path()), &SleepTunneler).await.unwrap();
        assert_eq!(resolved.endpoint, "unix:///tmp/t.sock");
        assert!(resolved.releaser.has_tunnel());
        resolved.releaser.release().await.unwrap();
    }
}
