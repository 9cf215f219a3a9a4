//! Project derivation from container labels

use crate::constants::{COMPOSE_FILE_NAMES, LABEL_COMPOSE_CONFIG_FILES, LABEL_COMPOSE_WORKING_DIR};
use crate::types::{Container, Project, ProjectStatus};
use chrono::Utc;
use dock_rs::ComposeApi;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whether `dir` holds one of the standard compose file names
pub fn is_compose_project_dir(dir: &Path) -> bool {
    COMPOSE_FILE_NAMES.iter().any(|name| dir.join(name).is_file())
}

/// Project name compose would give `dir`: its last path component
pub fn project_name_for_dir(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Project for the directory the dashboard was started in
pub fn current_dir_project(dir: &Path) -> Project {
    let mut project = Project::new(project_name_for_dir(dir));
    project.path = Some(dir.to_path_buf());
    project.status = ProjectStatus::NotCreated;
    project
}

#[derive(Default)]
struct Tally {
    path: Option<PathBuf>,
    compose_files: Option<String>,
    container_count: usize,
    running_count: usize,
    services: HashSet<String>,
}

/// Group containers into projects by their compose project label
///
/// When `started_in` is a compose directory with no containers yet, it is
/// added as a not-created project. Service counts that cannot be seen on
/// containers are asked from the compose tool.
pub async fn derive_projects(
    containers: &[Arc<Container>],
    started_in: Option<&Path>,
    compose: &dyn ComposeApi,
) -> Vec<Project> {
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for container in containers {
        let info = container.info();
        if info.project_name.is_empty() {
            continue;
        }
        let tally = tallies.entry(info.project_name.clone()).or_default();
        tally.container_count += 1;
        if container.is_running() {
            tally.running_count += 1;
        }
        if tally.path.is_none()
            && let Some(dir) = info.summary.label(LABEL_COMPOSE_WORKING_DIR).filter(|d| !d.is_empty())
        {
            tally.path = Some(PathBuf::from(dir));
        }
        if tally.compose_files.is_none()
            && let Some(files) = info.summary.label(LABEL_COMPOSE_CONFIG_FILES).filter(|f| !f.is_empty())
        {
            tally.compose_files = Some(files.to_string());
        }
        if !info.service_name.is_empty() {
            tally.services.insert(info.service_name);
        }
    }

    let now = Utc::now();
    let mut projects = Vec::with_capacity(tallies.len() + 1);
    for (name, tally) in tallies {
        let mut project = Project::new(name);
        project.container_count = tally.container_count;
        project.running_count = tally.running_count;
        project.status = ProjectStatus::from_counts(tally.running_count, tally.container_count);
        project.service_count = tally.services.len() as i64;
        project.path = tally.path;
        project.compose_files = tally.compose_files;
        project.last_updated = Some(now);

        if project.service_count == 0
            && let Some(path) = project.path.as_deref()
        {
            match compose.service_count(Some(path)).await {
                Ok(count) => project.service_count = count as i64,
                Err(e) => tracing::debug!(project = %project.name, "Service count probe failed: {}", e),
            }
        }
        projects.push(project);
    }

    if let Some(dir) = started_in {
        let name = project_name_for_dir(dir);
        if !projects.iter().any(|p| p.name == name) {
            let mut project = current_dir_project(dir);
            project.last_updated = Some(now);
            project.service_count = match compose.service_count(Some(dir)).await {
                Ok(count) => count as i64,
                Err(e) => {
                    tracing::warn!(project = %name, "Service count probe failed: {}", e);
                    -1
                }
            };
            projects.push(project);
        }
    }

    projects
}

/// Order projects with `current` first, then by name
pub fn sort_projects(projects: &mut [Project], current: Option<&str>) {
    projects.sort_by(|a, b| {
        let a_current = Some(a.name.as_str()) == current;
        let b_current = Some(b.name.as_str()) == current;
        b_current.cmp(&a_current).then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::FakeCompose;
    use crate::types::test_support::summary;
    use dock_rs::ContainerSummary;

    fn labelled(mut s: ContainerSummary, key: &str, value: &str) -> ContainerSummary {
        s.labels.insert(key.to_string(), value.to_string());
        s
    }

    fn containers(summaries: Vec<ContainerSummary>) -> Vec<Arc<Container>> {
        summaries
            .into_iter()
            .map(|s| Arc::new(Container::new(s)))
            .collect()
    }

    #[tokio::test]
    async fn test_status_and_counts() {
        let mut listing = Vec::new();
        for i in 0..5 {
            listing.push(summary(&format!("r{i}"), "all", "web", "running"));
            let state = if i < 3 { "running" } else { "exited" };
            listing.push(summary(&format!("m{i}"), "some", &format!("svc{i}"), state));
            listing.push(summary(&format!("s{i}"), "none", "db", "exited"));
        }
        listing.push(summary("plain", "", "", "running"));
        let compose = FakeCompose::failing();

        let projects = derive_projects(&containers(listing), None, &compose).await;
        let by_name = |name: &str| projects.iter().find(|p| p.name == name).unwrap();

        assert_eq!(projects.len(), 3);
        assert_eq!(by_name("all").status, ProjectStatus::Running);
        assert_eq!(by_name("none").status, ProjectStatus::Stopped);
        let some = by_name("some");
        assert_eq!(some.status, ProjectStatus::Mixed);
        assert_eq!((some.running_count, some.container_count), (3, 5));
        assert_eq!(some.service_count, 5);
        assert_eq!(by_name("all").service_count, 1);
    }

    #[tokio::test]
    async fn test_first_non_empty_labels_win() {
        let listing = vec![
            labelled(summary("a", "shop", "web", "running"), LABEL_COMPOSE_WORKING_DIR, ""),
            labelled(
                labelled(summary("b", "shop", "db", "running"), LABEL_COMPOSE_WORKING_DIR, "/srv/shop"),
                LABEL_COMPOSE_CONFIG_FILES,
                "/srv/shop/compose.yml",
            ),
            labelled(summary("c", "shop", "cache", "running"), LABEL_COMPOSE_WORKING_DIR, "/elsewhere"),
        ];
        let compose = FakeCompose::failing();

        let projects = derive_projects(&containers(listing), None, &compose).await;
        assert_eq!(projects[0].path.as_deref(), Some(Path::new("/srv/shop")));
        assert_eq!(projects[0].compose_file_names(), vec!["compose.yml"]);
    }

    #[tokio::test]
    async fn test_service_count_probed_when_unlabelled() {
        let listing = vec![labelled(
            summary("a", "shop", "", "exited"),
            LABEL_COMPOSE_WORKING_DIR,
            "/srv/shop",
        )];
        let compose = FakeCompose::with_services(&["web", "db"]);

        let projects = derive_projects(&containers(listing), None, &compose).await;
        assert_eq!(projects[0].service_count, 2);
    }

    #[tokio::test]
    async fn test_current_dir_project_is_synthesized() {
        let compose = FakeCompose::with_services(&["web", "db", "cache"]);
        let dir = Path::new("/home/me/shop");

        let projects = derive_projects(&[], Some(dir), &compose).await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "shop");
        assert_eq!(projects[0].status, ProjectStatus::NotCreated);
        assert_eq!(projects[0].service_count, 3);
        assert_eq!(projects[0].path.as_deref(), Some(dir));
    }

    #[tokio::test]
    async fn test_current_dir_project_probe_failure() {
        let compose = FakeCompose::failing();
        let projects = derive_projects(&[], Some(Path::new("/home/me/shop")), &compose).await;
        assert_eq!(projects[0].service_count, -1);
    }

    #[tokio::test]
    async fn test_current_dir_project_not_duplicated() {
        let compose = FakeCompose::with_services(&["web"]);
        let listing = vec![summary("a", "shop", "web", "running")];
        let projects =
            derive_projects(&containers(listing), Some(Path::new("/home/me/shop")), &compose).await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].status, ProjectStatus::Running);
    }

    #[test]
    fn test_sort_projects_current_first() {
        let mut projects = vec![Project::new("b"), Project::new("c"), Project::new("a")];
        sort_projects(&mut projects, Some("c"));
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        sort_projects(&mut projects, None);
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_compose_project_dir_detection() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_compose_project_dir(dir.path()));
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        assert!(is_compose_project_dir(dir.path()));
    }
}
