//! Container runtime client
//!
//! [`RuntimeApi`] is the narrow surface the dashboard needs from the Docker
//! engine. [`DockerClient`] implements it on top of bollard.

use crate::error::{DockError, Result};
use crate::nullable;
use crate::stats::ContainerStats;
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Connection timeout passed to bollard, in seconds
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Summary row from the container listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub names: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image: String,
    #[serde(default, deserialize_with = "nullable")]
    pub command: String,
    /// Creation time, unix seconds
    #[serde(default, deserialize_with = "nullable")]
    pub created: i64,
    /// Machine state, e.g. "running" or "exited"
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    /// Human status, e.g. "Up 3 hours"
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Full inspection payload of a container
///
/// Kept as raw JSON so the inspect view can show everything the engine
/// returns. Accessors cover the fields the dashboard reads directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerDetails {
    raw: serde_json::Value,
}

impl ContainerDetails {
    pub fn from_value(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    pub fn exit_code(&self) -> Option<i64> {
        self.raw.pointer("/State/ExitCode").and_then(|v| v.as_i64())
    }

    /// Pretty-printed JSON for display
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_default()
    }
}

/// Operations the dashboard performs against the container runtime
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// List all containers, including stopped ones
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Fetch the detailed inspection payload of one container
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;

    /// Open a continuous stats feed for one container
    ///
    /// The feed ends when the container stops or the receiver is dropped.
    async fn stats_stream(&self, id: &str)
    -> Result<mpsc::UnboundedReceiver<Result<ContainerStats>>>;
}

/// Docker engine client backed by bollard
#[derive(Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to a resolved endpoint
    ///
    /// The API version is negotiated with the daemon. If the daemon cannot
    /// be reached yet the client falls back to the default version.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let docker = connect_endpoint(endpoint)?;
        let docker = match docker.clone().negotiate_version().await {
            Ok(negotiated) => negotiated,
            Err(e) => {
                tracing::warn!("API version negotiation with {} failed: {}", endpoint, e);
                docker
            }
        };
        tracing::info!("Connected to docker at {}", endpoint);
        Ok(Self { docker })
    }

}

/// TLS material from DOCKER_CERT_PATH / DOCKER_TLS_VERIFY
struct TlsPaths {
    key: PathBuf,
    cert: PathBuf,
    ca: PathBuf,
}

impl TlsPaths {
    fn from_env() -> Option<Self> {
        let cert_path = std::env::var("DOCKER_CERT_PATH").ok().filter(|p| !p.is_empty());
        let verify = std::env::var("DOCKER_TLS_VERIFY")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        if cert_path.is_none() && !verify {
            return None;
        }
        let dir = cert_path
            .map(PathBuf::from)
            .or_else(|| dirs_next::home_dir().map(|h| h.join(".docker")))?;
        Some(Self {
            key: dir.join("key.pem"),
            cert: dir.join("cert.pem"),
            ca: dir.join("ca.pem"),
        })
    }
}

fn connect_endpoint(endpoint: &str) -> Result<Docker> {
    if endpoint.starts_with("unix://") {
        #[cfg(unix)]
        return Ok(Docker::connect_with_unix(
            endpoint,
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )?);
        #[cfg(not(unix))]
        return Err(DockError::Connection(format!(
            "unix sockets are not supported on this platform: {endpoint}"
        )));
    }

    if endpoint.starts_with("npipe://") {
        #[cfg(windows)]
        return Ok(Docker::connect_with_named_pipe(
            endpoint,
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )?);
        #[cfg(not(windows))]
        return Err(DockError::Connection(format!(
            "named pipes are only supported on windows: {endpoint}"
        )));
    }

    if endpoint.starts_with("tcp://")
        || endpoint.starts_with("http://")
        || endpoint.starts_with("https://")
    {
        if let Some(tls) = TlsPaths::from_env() {
            return Ok(Docker::connect_with_ssl(
                endpoint,
                &tls.key,
                &tls.cert,
                &tls.ca,
                CONNECT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )?);
        }
        return Ok(Docker::connect_with_http(
            endpoint,
            CONNECT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )?);
    }

    Err(DockError::Connection(format!(
        "unsupported docker endpoint: {endpoint}"
    )))
}

/// Convert a bollard model into our own serde mirror of the same JSON
fn convert<T, U>(value: T) -> Result<U>
where
    T: Serialize,
    U: serde::de::DeserializeOwned,
{
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

#[async_trait]
impl RuntimeApi for DockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        containers.into_iter().map(convert).collect()
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let details = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(ContainerDetails::from_value(serde_json::to_value(details)?))
    }

    async fn stats_stream(
        &self,
        id: &str,
    ) -> Result<mpsc::UnboundedReceiver<Result<ContainerStats>>> {
        let docker = self.docker.clone();
        let id = id.to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let options = StatsOptions {
                stream: true,
                one_shot: false,
            };
            let mut stream = docker.stats(&id, Some(options));

            while let Some(item) = stream.next().await {
                let item = item.map_err(DockError::from).and_then(convert);
                let failed = item.is_err();
                if tx.send(item).is_err() {
                    // Receiver dropped, stop streaming
                    break;
                }
                if failed {
                    break;
                }
            }
            tracing::debug!("Stats stream for {} ended", id);
        });

        Ok(rx)
    }
}
