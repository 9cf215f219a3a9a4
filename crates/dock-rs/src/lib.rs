//! dock-rs: Docker runtime SDK for dock-pilot
//!
//! Resolves which daemon to talk to (environment, CLI contexts, SSH
//! tunnels), wraps the engine API behind [`RuntimeApi`], and runs the
//! compose CLI for project-level operations.
//!
//! # Example
//!
//! ```no_run
//! use dock_rs::{DockerClient, HostSources, RuntimeApi, SshTunneler, resolve_host};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sources = HostSources::from_env()?;
//!     let host = resolve_host(&sources, &SshTunneler::new()).await?;
//!     let client = DockerClient::connect(&host.endpoint).await?;
//!
//!     for c in client.list_containers().await? {
//!         println!("{} {}", c.id, c.state);
//!     }
//!
//!     host.releaser.release().await?;
//!     Ok(())
//! }
//! ```

// bollard's error type is large; errors are on the cold path
#![allow(clippy::result_large_err)]

pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod host;
pub mod stats;
pub mod tunnel;

pub use bollard;
pub use client::{ContainerDetails, ContainerSummary, DockerClient, RuntimeApi};
pub use compose::{
    COMPOSE_PLUGIN_COMMAND, COMPOSE_STANDALONE_COMMAND, ComposeApi, ComposeCli, command_from_line,
    output_lines, split_command_line,
};
pub use config::{CliConfig, ContextMetadata, ContextStore, EndpointMeta};
pub use error::{DockError, Result};
pub use host::{
    DEFAULT_DOCKER_HOST, HostReleaser, HostSources, ResolvedHost, determine_docker_host,
    resolve_host,
};
pub use stats::ContainerStats;
pub use tunnel::{SshTunneler, Tunnel, Tunneler};

/// Deserialize a possibly-null field into its default value
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
