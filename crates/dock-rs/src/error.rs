//! Error types for the Docker runtime SDK

use thiserror::Error;

/// Errors produced while talking to the container runtime or its tooling
#[derive(Debug, Error)]
pub enum DockError {
    /// Error returned by the Docker Engine API
    #[error("Docker API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Could not establish or use a connection to the runtime
    #[error("Connection error: {0}")]
    Connection(String),

    /// A configuration file was expected but does not exist
    #[error("Config not found: {0}")]
    ConfigNotFound(String),

    /// A configuration file exists but could not be understood
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// The named context has no metadata in the context store
    #[error("Context not found: {0}")]
    ContextNotFound(String),

    /// The named context exists but carries no docker endpoint entry
    #[error("Context '{0}' has no docker endpoint")]
    EndpointNotFound(String),

    /// SSH tunnel could not be created or torn down
    #[error("Tunnel error: {0}")]
    Tunnel(String),

    /// A compose CLI invocation exited unsuccessfully
    #[error("{stderr}")]
    Compose { command: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

/// Result alias used throughout the SDK
pub type Result<T> = std::result::Result<T, DockError>;
