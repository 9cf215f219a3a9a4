//! Rendered commands for project lifecycle, compose config and logs

use crate::command::{CommandObject, apply_template};
use crate::config::CommandTemplates;
use crate::errors::{format_compose_config_error, format_dock_error};
use crate::types::{Container, Project, Service};
use dock_rs::{ComposeApi, command_from_line};
use tokio::process::Command;

/// Project-level lifecycle commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Up,
    Down,
    DownWithVolumes,
}

impl ProjectAction {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectAction::Up => "up",
            ProjectAction::Down => "down",
            ProjectAction::DownWithVolumes => "down --volumes",
        }
    }

    fn template<'a>(&self, templates: &'a CommandTemplates) -> &'a str {
        match self {
            ProjectAction::Up => &templates.up,
            ProjectAction::Down => &templates.down,
            ProjectAction::DownWithVolumes => &templates.down_with_volumes,
        }
    }
}

/// Command object for commands that need the project's compose files
fn compose_file_object(compose: &dyn ComposeApi, project: &Project) -> CommandObject {
    CommandObject::with_compose_files(compose.base_command(), Some(project))
        .merge(CommandObject::default().project(project.name.clone()))
}

/// Command object for commands that only need the project name
fn project_name_object(compose: &dyn ComposeApi, project: Option<&Project>) -> CommandObject {
    let object = CommandObject::with_project_name(compose.base_command(), project);
    match project {
        Some(p) => object.project(p.name.clone()),
        None => object,
    }
}

/// Run a lifecycle action in the project's directory
///
/// Errors come back as a message for the error panel.
pub async fn run_project_action(
    compose: &dyn ComposeApi,
    templates: &CommandTemplates,
    project: &Project,
    action: ProjectAction,
) -> Result<(), String> {
    let line = apply_template(action.template(templates), &compose_file_object(compose, project));
    tracing::info!(project = %project.name, "Running {}: {}", action.label(), line);

    compose
        .run(&line, project.path.as_deref())
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::error!(project = %project.name, "{} failed: {}", action.label(), e);
            format_dock_error(&e)
        })
}

/// Restart one service of the project
pub async fn restart_service(
    compose: &dyn ComposeApi,
    templates: &CommandTemplates,
    project: &Project,
    service: &Service,
) -> Result<(), String> {
    let object = compose_file_object(compose, project).service(service.name.clone());
    let line = apply_template(&templates.restart_service, &object);
    tracing::info!(project = %project.name, service = %service.name, "Restarting service: {}", line);

    compose
        .run(&line, project.path.as_deref())
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::error!(service = %service.name, "Restart failed: {}", e);
            format_dock_error(&e)
        })
}

/// Text for the config tab: the resolved compose config, or an explanation
/// of why it could not be loaded
pub async fn compose_config_text(
    compose: &dyn ComposeApi,
    templates: &CommandTemplates,
    project: &Project,
) -> String {
    let line = apply_template(
        &templates.docker_compose_config,
        &compose_file_object(compose, project),
    );
    match compose.run(&line, project.path.as_deref()).await {
        Ok(output) => output,
        Err(e) => {
            let path = project
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            format_compose_config_error(&project.name, &path, &format_dock_error(&e))
        }
    }
}

/// Follows every service's logs of the project
pub fn all_logs_command(
    compose: &dyn ComposeApi,
    templates: &CommandTemplates,
    project: &Project,
) -> dock_rs::Result<Command> {
    let line = apply_template(&templates.all_logs, &project_name_object(compose, Some(project)));
    command_from_line(&line, project.path.as_deref())
}

/// Follows one service's logs
pub fn service_logs_command(
    compose: &dyn ComposeApi,
    templates: &CommandTemplates,
    project: Option<&Project>,
    service: &Service,
) -> dock_rs::Result<Command> {
    let object = project_name_object(compose, project).service(service.name.clone());
    let line = apply_template(&templates.service_logs, &object);
    command_from_line(&line, project.and_then(|p| p.path.as_deref()))
}

/// Follows one container's logs
pub fn container_logs_command(
    compose: &dyn ComposeApi,
    templates: &CommandTemplates,
    container: &Container,
) -> dock_rs::Result<Command> {
    let object = CommandObject::new(compose.base_command()).container(container);
    let line = apply_template(&templates.container_logs, &object);
    command_from_line(&line, None)
}
