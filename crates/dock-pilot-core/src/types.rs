//! Core domain types: containers, services, projects and stats samples

use crate::constants::{
    LABEL_COMPOSE_CONTAINER_NUMBER, LABEL_COMPOSE_ONEOFF, LABEL_COMPOSE_PROJECT,
    LABEL_COMPOSE_SERVICE, LABEL_NAME, ONEOFF_TRUE, STATE_RUNNING,
};
use chrono::{DateTime, Utc};
use dock_rs::{ContainerDetails, ContainerStats, ContainerSummary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Fields recomputed from the runtime listing on every refresh
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    pub name: String,
    pub summary: ContainerSummary,
    /// Compose service label, empty for non-compose containers
    pub service_name: String,
    /// Compose project label, empty for non-compose containers
    pub project_name: String,
    pub container_number: String,
    pub one_off: bool,
    /// Last successful inspection; kept when a later inspection fails
    pub details: Option<ContainerDetails>,
}

impl ContainerInfo {
    fn from_summary(summary: ContainerSummary, details: Option<ContainerDetails>) -> Self {
        let label = |key: &str| summary.label(key).unwrap_or_default().to_string();
        Self {
            name: display_name(&summary),
            service_name: label(LABEL_COMPOSE_SERVICE),
            project_name: label(LABEL_COMPOSE_PROJECT),
            container_number: label(LABEL_COMPOSE_CONTAINER_NUMBER),
            one_off: summary.label(LABEL_COMPOSE_ONEOFF) == Some(ONEOFF_TRUE),
            details,
            summary,
        }
    }
}

/// Display name: the `name` label, else the first name without its leading
/// slashes, else the ID
pub fn display_name(summary: &ContainerSummary) -> String {
    if let Some(name) = summary.label(LABEL_NAME) {
        return name.to_string();
    }
    match summary.names.first() {
        Some(name) => name.trim_start_matches('/').to_string(),
        None => summary.id.clone(),
    }
}

/// A container known to the dashboard
///
/// One instance exists per runtime ID for as long as the runtime reports
/// that ID. It is shared as `Arc<Container>` between the inventory, the
/// stats recorder and the UI, so every field is behind interior locking.
#[derive(Debug)]
pub struct Container {
    id: String,
    info: RwLock<ContainerInfo>,
    monitoring: AtomicBool,
    stats: Mutex<Vec<RecordedStats>>,
}

impl Container {
    pub fn new(summary: ContainerSummary) -> Self {
        Self {
            id: summary.id.clone(),
            info: RwLock::new(ContainerInfo::from_summary(summary, None)),
            monitoring: AtomicBool::new(false),
            stats: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the listing-derived fields
    pub fn info(&self) -> ContainerInfo {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_info<R>(&self, f: impl FnOnce(&ContainerInfo) -> R) -> R {
        f(&self.info.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn name(&self) -> String {
        self.with_info(|i| i.name.clone())
    }

    pub fn service_name(&self) -> String {
        self.with_info(|i| i.service_name.clone())
    }

    pub fn project_name(&self) -> String {
        self.with_info(|i| i.project_name.clone())
    }

    pub fn is_one_off(&self) -> bool {
        self.with_info(|i| i.one_off)
    }

    /// Runtime state, e.g. "running"
    pub fn state(&self) -> String {
        self.with_info(|i| i.summary.state.clone())
    }

    pub fn is_running(&self) -> bool {
        self.with_info(|i| i.summary.state == STATE_RUNNING)
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.with_info(|i| i.summary.label(key).map(String::from))
    }

    pub fn details(&self) -> Option<ContainerDetails> {
        self.with_info(|i| i.details.clone())
    }

    /// Recompute listing-derived fields, keeping details and stats
    pub fn apply_listing(&self, summary: ContainerSummary) {
        let mut info = self.info.write().unwrap_or_else(PoisonError::into_inner);
        let details = info.details.take();
        *info = ContainerInfo::from_summary(summary, details);
    }

    pub fn set_details(&self, details: ContainerDetails) {
        self.info
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .details = Some(details);
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    pub fn set_monitoring(&self, monitoring: bool) {
        self.monitoring.store(monitoring, Ordering::SeqCst);
    }

    /// Record a sample and drop samples older than `max_duration` before the
    /// newest one
    pub fn append_stats(&self, sample: RecordedStats, max_duration: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        crate::metrics::append_within_window(&mut stats, sample, max_duration);
    }

    /// Samples ordered by capture time
    pub fn stats(&self) -> Vec<RecordedStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latest_stats(&self) -> Option<RecordedStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

/// A compose service of the current project
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub id: String,
    /// First non-one-off container of this service, if any
    pub container: Option<Arc<Container>>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            container: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.container.as_ref().is_some_and(|c| c.is_running())
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.id == other.id
            && match (&self.container, &other.container) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Aggregate status of a compose project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProjectStatus {
    Running,
    Stopped,
    Mixed,
    #[default]
    Unknown,
    /// Defined in the working directory but never started
    NotCreated,
}

impl ProjectStatus {
    /// Status from container counts
    pub fn from_counts(running: usize, total: usize) -> Self {
        if running == 0 {
            ProjectStatus::Stopped
        } else if running == total {
            ProjectStatus::Running
        } else {
            ProjectStatus::Mixed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Running => "running",
            ProjectStatus::Stopped => "stopped",
            ProjectStatus::Mixed => "mixed",
            ProjectStatus::Unknown => "unknown",
            ProjectStatus::NotCreated => "not created",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A compose project grouping containers by project label
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    /// Working directory recorded by compose
    pub path: Option<PathBuf>,
    /// Comma-separated compose file list recorded by compose
    pub compose_files: Option<String>,
    pub is_docker_compose: bool,
    pub container_count: usize,
    pub running_count: usize,
    /// Number of services; -1 when it could not be determined
    pub service_count: i64,
    pub status: ProjectStatus,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            compose_files: None,
            is_docker_compose: true,
            container_count: 0,
            running_count: 0,
            service_count: 0,
            status: ProjectStatus::Unknown,
            last_updated: None,
        }
    }

    /// Bare file names of the recorded compose files
    pub fn compose_file_names(&self) -> Vec<String> {
        self.compose_files
            .as_deref()
            .map(|files| {
                files
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(|f| {
                        std::path::Path::new(f)
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| f.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Percentages derived from a raw sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedStats {
    pub cpu_percentage: f64,
    pub memory_percentage: f64,
}

/// One recorded stats sample
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStats {
    pub stats: ContainerStats,
    pub derived: DerivedStats,
    pub recorded_at: DateTime<Utc>,
}

impl RecordedStats {
    pub fn new(stats: ContainerStats, recorded_at: DateTime<Utc>) -> Self {
        let derived = DerivedStats {
            cpu_percentage: stats.cpu_percentage(),
            memory_percentage: stats.memory_percentage(),
        };
        Self {
            stats,
            derived,
            recorded_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_display_name_prefers_label() {
        let mut s = summary("abc", "shop", "web", "running");
        assert_eq!(display_name(&s), "shop-web-abc");

        s.labels.insert("name".to_string(), "frontend".to_string());
        assert_eq!(display_name(&s), "frontend");

        let bare = ContainerSummary {
            id: "deadbeef".to_string(),
            ..Default::default()
        };
        assert_eq!(display_name(&bare), "deadbeef");
    }

    #[test]
    fn test_container_fields_from_labels() {
        let c = Container::new(one_off("x1", "shop", "migrate"));
        assert_eq!(c.id(), "x1");
        assert_eq!(c.project_name(), "shop");
        assert_eq!(c.service_name(), "migrate");
        assert!(c.is_one_off());
        assert!(c.is_running());

        let plain = Container::new(summary("x2", "", "", "exited"));
        assert_eq!(plain.project_name(), "");
        assert!(!plain.is_one_off());
        assert!(!plain.is_running());
    }

    #[test]
    fn test_apply_listing_keeps_details() {
        let c = Container::new(summary("x1", "shop", "web", "running"));
        c.set_details(ContainerDetails::from_value(serde_json::json!({"Id": "x1"})));
        c.apply_listing(summary("x1", "shop", "api", "exited"));
        assert_eq!(c.service_name(), "api");
        assert_eq!(c.state(), "exited");
        assert!(c.details().is_some());
    }

    #[test]
    fn test_project_status_from_counts() {
        assert_eq!(ProjectStatus::from_counts(5, 5), ProjectStatus::Running);
        assert_eq!(ProjectStatus::from_counts(0, 5), ProjectStatus::Stopped);
        assert_eq!(ProjectStatus::from_counts(3, 5), ProjectStatus::Mixed);
        assert_eq!(ProjectStatus::NotCreated.to_string(), "not created");
    }

    #[test]
    fn test_compose_file_names() {
        let mut p = Project::new("shop");
        assert!(p.compose_file_names().is_empty());

        p.compose_files = Some("/srv/shop/compose.yml, /srv/shop/compose.override.yml".to_string());
        assert_eq!(
            p.compose_file_names(),
            vec!["compose.yml", "compose.override.yml"]
        );
    }

    #[test]
    fn test_service_equality_is_by_container_identity() {
        let c = Arc::new(Container::new(summary("x1", "shop", "web", "running")));
        let twin = Arc::new(Container::new(summary("x1", "shop", "web", "running")));

        let mut a = Service::new("web");
        a.container = Some(c.clone());
        let mut b = Service::new("web");
        b.container = Some(c);
        assert_eq!(a, b);

        b.container = Some(twin);
        assert_ne!(a, b);
    }
}
