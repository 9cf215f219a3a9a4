//! User configuration
//!
//! Read from `<config dir>/dock-pilot/config.yml`. Every field has a
//! default, so a missing file or a partial file is fine.

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    pub command_templates: CommandTemplates,
    pub stats: StatsConfig,
    pub refresh: RefreshConfig,
    pub gui: GuiConfig,
}

/// Templates for commands run on the user's behalf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandTemplates {
    /// Base compose invocation
    pub docker_compose: String,
    pub up: String,
    pub down: String,
    pub down_with_volumes: String,
    pub docker_compose_config: String,
    pub all_logs: String,
    pub service_logs: String,
    pub container_logs: String,
    pub restart_service: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            docker_compose: dock_rs::COMPOSE_PLUGIN_COMMAND.to_string(),
            up: "{{ .DockerCompose }} up -d".to_string(),
            down: "{{ .DockerCompose }} down".to_string(),
            down_with_volumes: "{{ .DockerCompose }} down --volumes".to_string(),
            docker_compose_config: "{{ .DockerCompose }} config".to_string(),
            all_logs: "{{ .DockerCompose }} logs --tail=300 --follow".to_string(),
            service_logs: "{{ .DockerCompose }} logs --since=60m --follow {{ .Service.Name }}"
                .to_string(),
            container_logs: "docker logs --timestamps --since=60m --follow {{ .Container.ID }}"
                .to_string(),
            restart_service: "{{ .DockerCompose }} restart {{ .Service.Name }}".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsConfig {
    /// Trailing window of samples to keep per container
    pub max_duration_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: defaults::STATS_MAX_DURATION_SECS,
        }
    }
}

impl StatsConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshConfig {
    pub interval_ms: u64,
    /// Parallel inspection requests during a refresh
    pub inspect_concurrency: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::REFRESH_INTERVAL_MS,
            inspect_concurrency: defaults::INSPECT_CONCURRENCY,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuiConfig {
    pub wrap_main_panel: bool,
    /// Time a replaced background task gets to exit
    pub stop_timeout_ms: u64,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            wrap_main_panel: true,
            stop_timeout_ms: defaults::STOP_TIMEOUT_MS,
        }
    }
}

impl GuiConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl UserConfig {
    /// Default config path (`<config dir>/dock-pilot/config.yml`)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs_next::config_dir().ok_or(ConfigError::NoConfigDirectory)?;
        Ok(dir.join("dock-pilot").join("config.yml"))
    }

    /// Load from `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Config merged with defaults, as YAML
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_default()
    }
}
