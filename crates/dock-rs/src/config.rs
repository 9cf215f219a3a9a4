//! Docker CLI configuration parsing
//!
//! Reads the parts of the Docker CLI configuration that decide which
//! endpoint to talk to: the `currentContext` entry of `config.json` and the
//! context store under `contexts/meta`.

use crate::error::{DockError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the Docker CLI configuration directory
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

/// Name of the endpoint entry holding Docker connection details
pub const DOCKER_ENDPOINT: &str = "docker";

/// Subset of the Docker CLI `config.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Name of the context selected with `docker context use`
    #[serde(default)]
    pub current_context: Option<String>,
}

impl CliConfig {
    /// Resolve the configuration directory (`$DOCKER_CONFIG` or `~/.docker`)
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DOCKER_CONFIG_ENV)
            && !dir.is_empty()
        {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs_next::home_dir().ok_or(DockError::NoHomeDirectory)?;
        Ok(home.join(".docker"))
    }

    /// Load `config.json` from a configuration directory
    ///
    /// A missing file is not an error: the Docker CLI runs fine without one.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| DockError::ConfigInvalid(format!("{}: {}", path.display(), e)))
    }
}

/// Metadata stored for a named context
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextMetadata {
    pub name: String,
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointMeta>,
}

/// Connection details of a context endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointMeta {
    /// Endpoint address, may be empty
    #[serde(rename = "Host", default)]
    pub host: String,
    #[serde(rename = "SkipTLSVerify", default)]
    pub skip_tls_verify: bool,
}

/// Read-only view of the Docker CLI context store
#[derive(Debug, Clone)]
pub struct ContextStore {
    root: PathBuf,
}

impl ContextStore {
    /// Open the store located under a configuration directory
    pub fn new(config_dir: &Path) -> Self {
        Self {
            root: config_dir.join("contexts"),
        }
    }

    /// Path of the metadata file for a context
    ///
    /// Contexts are stored in a directory named after the SHA-256 digest of
    /// their name.
    pub fn metadata_path(&self, name: &str) -> PathBuf {
        let digest = Sha256::digest(name.as_bytes());
        self.root
            .join("meta")
            .join(format!("{:x}", digest))
            .join("meta.json")
    }

    /// Load the metadata for a named context
    pub fn get_metadata(&self, name: &str) -> Result<ContextMetadata> {
        let path = self.metadata_path(name);
        if !path.exists() {
            return Err(DockError::ContextNotFound(name.to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| DockError::ConfigInvalid(format!("{}: {}", path.display(), e)))
    }

    /// Get the docker endpoint of a named context
    pub fn docker_endpoint(&self, name: &str) -> Result<EndpointMeta> {
        let mut metadata = self.get_metadata(name)?;
        metadata
            .endpoints
            .remove(DOCKER_ENDPOINT)
            .ok_or_else(|| DockError::EndpointNotFound(name.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ContextStore;
    use std::path::Path;

    /// Write a context's meta.json with the given endpoints JSON
    pub fn write_context(config_dir: &Path, name: &str, endpoints: &str) {
        let store = ContextStore::new(config_dir);
        let path = store.metadata_path(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let meta = format!(
            r#"{{"Name":"{}","Metadata":{{}},"Endpoints":{}}}"#,
            name, endpoints
        );
        std::fs::write(path, meta).unwrap();
    }

    pub fn write_current_context(config_dir: &Path, name: &str) {
        std::fs::write(
            config_dir.join("config.json"),
            format!(r#"{{"auths":{{}},"currentContext":"{}"}}"#, name),
        )
        .unwrap();
    }
}
