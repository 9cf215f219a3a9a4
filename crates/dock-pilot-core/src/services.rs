//! Service derivation for the current compose project

use crate::types::{Container, Project, Service};
use dock_rs::ComposeApi;
use std::collections::HashSet;
use std::sync::Arc;

/// Services of `project_name` seen on containers, in first-seen order
///
/// One-off containers count towards a service's existence.
pub fn services_from_containers(containers: &[Arc<Container>], project_name: &str) -> Vec<Service> {
    let mut seen = HashSet::new();
    containers
        .iter()
        .filter(|c| c.project_name() == project_name)
        .map(|c| c.service_name())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .map(Service::new)
        .collect()
}

/// Give each service its first non-one-off container of the same project
/// and service name, or none
pub fn assign_containers(services: &mut [Service], containers: &[Arc<Container>], project_name: &str) {
    for service in services.iter_mut() {
        service.container = containers
            .iter()
            .find(|c| {
                !c.is_one_off()
                    && c.project_name() == project_name
                    && c.service_name() == service.name
            })
            .cloned();
    }
}

/// Services to show for `project`
///
/// Derived from the project's containers. When none of them is running the
/// compose file is asked instead, so a project that was never started still
/// lists its services.
pub async fn load_services(
    containers: &[Arc<Container>],
    project: &Project,
    compose: &dyn ComposeApi,
) -> Vec<Service> {
    if project.name.is_empty() {
        return Vec::new();
    }

    let derived = services_from_containers(containers, &project.name);
    let any_running = containers
        .iter()
        .any(|c| c.project_name() == project.name && c.is_running());
    if any_running || !project.is_docker_compose {
        return derived;
    }

    match compose.services(project.path.as_deref()).await {
        Ok(names) => names.into_iter().map(Service::new).collect(),
        Err(e) => {
            tracing::warn!(project = %project.name, "Could not list compose services: {}", e);
            derived
        }
    }
}
