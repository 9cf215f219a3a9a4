//! Command objects and template rendering
//!
//! User-facing commands are templates such as
//! `{{ .DockerCompose }} logs --follow {{ .Service.Name }}`. A
//! [`CommandObject`] carries the values for one invocation and is built
//! fresh every time a command runs.

use crate::types::{Container, Project};

/// ID and name of a selected runtime object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: String,
    pub name: String,
}

/// Values available to command templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandObject {
    /// Compose invocation prefix, possibly with `-f`/`-p` flags
    pub docker_compose: String,
    pub project: Option<String>,
    pub service: Option<String>,
    pub container: Option<ObjectRef>,
    pub image: Option<ObjectRef>,
    pub volume: Option<String>,
    pub network: Option<String>,
}

impl CommandObject {
    pub fn new(docker_compose: impl Into<String>) -> Self {
        Self {
            docker_compose: docker_compose.into(),
            ..Default::default()
        }
    }

    /// Base object whose compose prefix passes the project's compose files
    ///
    /// Each file is reduced to its file name since commands run in the
    /// project directory.
    pub fn with_compose_files(docker_compose: &str, project: Option<&Project>) -> Self {
        let mut command = docker_compose.to_string();
        if let Some(project) = project {
            for file in project.compose_file_names() {
                command.push_str(" -f ");
                command.push_str(&file);
            }
        }
        Self::new(command)
    }

    /// Base object whose compose prefix selects the project by name
    pub fn with_project_name(docker_compose: &str, project: Option<&Project>) -> Self {
        let mut command = docker_compose.to_string();
        if let Some(project) = project
            && !project.name.is_empty()
        {
            command.push_str(" -p ");
            command.push_str(&project.name);
        }
        Self::new(command)
    }

    /// Fill every empty field from `overrides`; set fields are kept
    pub fn merge(mut self, overrides: CommandObject) -> Self {
        if self.docker_compose.is_empty() {
            self.docker_compose = overrides.docker_compose;
        }
        self.project = self.project.or(overrides.project);
        self.service = self.service.or(overrides.service);
        self.container = self.container.or(overrides.container);
        self.image = self.image.or(overrides.image);
        self.volume = self.volume.or(overrides.volume);
        self.network = self.network.or(overrides.network);
        self
    }

    pub fn project(mut self, name: impl Into<String>) -> Self {
        self.project = Some(name.into());
        self
    }

    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service = Some(name.into());
        self
    }

    pub fn container(mut self, container: &Container) -> Self {
        self.container = Some(ObjectRef {
            id: container.id().to_string(),
            name: container.name(),
        });
        self
    }

    /// Value of a template field such as `.Service.Name`
    fn field(&self, path: &str) -> Option<&str> {
        match path {
            ".DockerCompose" => Some(&self.docker_compose),
            ".Project.Name" => self.project.as_deref(),
            ".Service.Name" => self.service.as_deref(),
            ".Container.ID" => self.container.as_ref().map(|c| c.id.as_str()),
            ".Container.Name" => self.container.as_ref().map(|c| c.name.as_str()),
            ".Image.ID" => self.image.as_ref().map(|i| i.id.as_str()),
            ".Image.Name" => self.image.as_ref().map(|i| i.name.as_str()),
            ".Volume.Name" => self.volume.as_deref(),
            ".Network.Name" => self.network.as_deref(),
            _ => None,
        }
    }
}

/// Render `{{ .Field }}` placeholders; unknown or unset fields render empty
pub fn apply_template(template: &str, object: &CommandObject) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            // Unterminated placeholder, keep it verbatim
            out.push_str(&rest[start..]);
            return out;
        };
        let field = after[..end].trim();
        if let Some(value) = object.field(field) {
            out.push_str(value);
        } else {
            tracing::debug!("Template field {} has no value", field);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
