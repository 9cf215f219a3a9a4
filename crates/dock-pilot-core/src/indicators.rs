//! Health and status indicators for consistent UI representation

use crate::types::{Container, Project, ProjectStatus, Service};
use serde::{Deserialize, Serialize};

/// Universal health/status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HealthIndicator {
    /// Fully running
    Healthy,
    /// Partly running or restarting
    Warning,
    /// Exited with an error or dead
    Error,
    /// Cleanly stopped
    Stopped,
    /// Created or paused
    Pending,
    #[default]
    Unknown,
}

impl HealthIndicator {
    /// Unicode symbol for this status
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthIndicator::Healthy => "●",
            HealthIndicator::Warning => "◐",
            HealthIndicator::Error => "✗",
            HealthIndicator::Stopped => "○",
            HealthIndicator::Pending => "◌",
            HealthIndicator::Unknown => "?",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthIndicator::Healthy => "Healthy",
            HealthIndicator::Warning => "Warning",
            HealthIndicator::Error => "Error",
            HealthIndicator::Stopped => "Stopped",
            HealthIndicator::Pending => "Pending",
            HealthIndicator::Unknown => "Unknown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthIndicator::Healthy)
    }

}

impl std::fmt::Display for HealthIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Trait for types that can report their health status
pub trait HasHealth {
    fn health(&self) -> HealthIndicator;

    fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }
}

/// Indicator for a container runtime state string
pub fn container_health(state: &str) -> HealthIndicator {
    match state {
        "running" => HealthIndicator::Healthy,
        "restarting" => HealthIndicator::Warning,
        "exited" => HealthIndicator::Stopped,
        "dead" => HealthIndicator::Error,
        "created" | "paused" => HealthIndicator::Pending,
        _ => HealthIndicator::Unknown,
    }
}

impl HasHealth for ProjectStatus {
    fn health(&self) -> HealthIndicator {
        match self {
            ProjectStatus::Running => HealthIndicator::Healthy,
            ProjectStatus::Stopped => HealthIndicator::Stopped,
            ProjectStatus::Mixed => HealthIndicator::Warning,
            ProjectStatus::Unknown | ProjectStatus::NotCreated => HealthIndicator::Unknown,
        }
    }
}

impl HasHealth for Project {
    fn health(&self) -> HealthIndicator {
        self.status.health()
    }
}

impl HasHealth for Container {
    fn health(&self) -> HealthIndicator {
        let info = self.info();
        let exit_code = info.details.as_ref().and_then(|d| d.exit_code());
        match container_health(&info.summary.state) {
            HealthIndicator::Stopped if exit_code.is_some_and(|c| c != 0) => HealthIndicator::Error,
            other => other,
        }
    }
}

impl HasHealth for Service {
    fn health(&self) -> HealthIndicator {
        match &self.container {
            Some(container) => container.health(),
            None => HealthIndicator::Stopped,
        }
    }
}
