//! Refresh orchestration
//!
//! One refresh pass reconciles the inventory, derives the current project's
//! services and the project list, and publishes the result as a
//! [`DashboardState`] snapshot.

use crate::inventory::Inventory;
use crate::projects::{derive_projects, sort_projects};
use crate::services::{assign_containers, load_services};
use crate::tasks::CancelToken;
use crate::types::{Container, Project, Service};
use dock_rs::{ComposeApi, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Snapshot of the object graph handed to the presentation layer
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub containers: Vec<Arc<Container>>,
    /// Services of `current_project`
    pub services: Vec<Service>,
    pub projects: Vec<Project>,
    /// Project the dashboard is scoped to; `None` outside compose mode
    pub current_project: Option<Project>,
}

impl DashboardState {
    pub fn for_project(project: Option<Project>) -> Self {
        Self {
            current_project: project,
            ..Default::default()
        }
    }

    pub fn container(&self, id: &str) -> Option<&Arc<Container>> {
        self.containers.iter().find(|c| c.id() == id)
    }

    fn current_project_name(&self) -> Option<&str> {
        self.current_project.as_ref().map(|p| p.name.as_str())
    }
}

/// Message from the refresh loop
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Refreshed(DashboardState),
    RefreshFailed(String),
}

/// Coordinates refresh passes and owns the published snapshot
pub struct Orchestrator {
    inventory: Arc<Inventory>,
    compose: Arc<dyn ComposeApi>,
    /// Directory the dashboard was started in, when it is a compose project
    started_in: Option<PathBuf>,
    state: Mutex<DashboardState>,
}

impl Orchestrator {
    pub fn new(
        inventory: Arc<Inventory>,
        compose: Arc<dyn ComposeApi>,
        started_in: Option<PathBuf>,
        initial: DashboardState,
    ) -> Self {
        Self {
            inventory,
            compose,
            started_in,
            state: Mutex::new(initial),
        }
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    pub fn compose(&self) -> &Arc<dyn ComposeApi> {
        &self.compose
    }

    /// Latest published state
    pub fn snapshot(&self) -> DashboardState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scope the dashboard to `project` from the next refresh on
    pub fn select_project(&self, project: Option<Project>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = state.current_project_name() != project.as_ref().map(|p| p.name.as_str());
        state.current_project = project;
        if changed {
            state.services.clear();
        }
    }

    /// Compute the next state from `current`
    pub async fn refresh_all(&self, current: &DashboardState) -> Result<DashboardState> {
        let _services_guard = self.inventory.lock_services().await;

        let containers = self.inventory.refresh(&current.containers).await?;

        let Some(project) = current.current_project.as_ref() else {
            return Ok(DashboardState {
                containers,
                ..Default::default()
            });
        };

        let mut services = load_services(&containers, project, self.compose.as_ref()).await;
        assign_containers(&mut services, &containers, &project.name);

        let mut projects =
            derive_projects(&containers, self.started_in.as_deref(), self.compose.as_ref()).await;
        sort_projects(&mut projects, Some(&project.name));

        // Keep the selected project's figures current
        let current_project = projects
            .iter()
            .find(|p| p.name == project.name)
            .cloned()
            .or_else(|| Some(project.clone()));

        Ok(DashboardState {
            containers,
            services,
            projects,
            current_project,
        })
    }

    /// Refresh from the published state and publish the result
    pub async fn refresh(&self) -> Result<DashboardState> {
        let current = self.snapshot();
        let next = self.refresh_all(&current).await?;
        Ok(self.publish(&current, next))
    }

    fn publish(&self, based_on: &DashboardState, next: DashboardState) -> DashboardState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.current_project_name() == based_on.current_project_name() {
            *state = next;
        } else {
            // The user switched projects mid-pass, services belong to the old one
            tracing::debug!("Project changed during refresh, keeping new selection");
            state.containers = next.containers;
            state.projects = next.projects;
        }
        state.clone()
    }

    /// Refresh every `interval` until `cancel` fires, reporting each pass
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        interval: Duration,
        events: mpsc::UnboundedSender<DashboardEvent>,
        cancel: CancelToken,
    ) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let event = match orchestrator.refresh().await {
                    Ok(state) => DashboardEvent::Refreshed(state),
                    Err(e) => {
                        tracing::error!("Refresh failed: {}", e);
                        DashboardEvent::RefreshFailed(crate::errors::describe_error(&e))
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            tracing::debug!("Refresh loop stopped");
        })
    }
}
