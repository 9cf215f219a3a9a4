//! Compose CLI execution
//!
//! Compose has no engine API, so project-level operations shell out to the
//! compose binary. Commands are full command lines rendered from the user's
//! templates and run in the project directory.

use crate::error::{DockError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Compose plugin invocation
pub const COMPOSE_PLUGIN_COMMAND: &str = "docker compose";

/// Standalone compose binary, used when the plugin is unavailable
pub const COMPOSE_STANDALONE_COMMAND: &str = "docker-compose";

/// Split a command line into program and arguments
///
/// Whitespace separates arguments. Single or double quotes group words and
/// are removed.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        args.push(current);
    }
    args
}

/// Build a process for a command line, optionally rooted in a directory
pub fn command_from_line(line: &str, dir: Option<&Path>) -> Result<Command> {
    let args = split_command_line(line);
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| DockError::Connection("empty command".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(rest);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    Ok(cmd)
}

/// Non-empty trimmed lines of command output
pub fn output_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Project-level operations backed by the compose tool
#[async_trait]
pub trait ComposeApi: Send + Sync {
    /// Base compose invocation, e.g. `docker compose`
    fn base_command(&self) -> &str;

    /// Run a full command line to completion and return its stdout
    async fn run(&self, command_line: &str, dir: Option<&Path>) -> Result<String>;

    /// Names of the services declared by the project's compose files
    async fn services(&self, dir: Option<&Path>) -> Result<Vec<String>> {
        let line = format!("{} config --services", self.base_command());
        Ok(output_lines(&self.run(&line, dir).await?))
    }

    /// Number of declared services
    async fn service_count(&self, dir: Option<&Path>) -> Result<usize> {
        Ok(self.services(dir).await?.len())
    }
}

/// Compose tool invoked as a subprocess
#[derive(Debug, Clone)]
pub struct ComposeCli {
    command: String,
}

impl ComposeCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Pick a working compose invocation
    ///
    /// Anything other than the plugin default is taken as configured. The
    /// plugin is probed with `version` and the standalone binary is used when
    /// the probe fails.
    pub async fn detect(configured: &str) -> Self {
        if configured != COMPOSE_PLUGIN_COMMAND {
            return Self::new(configured);
        }

        let probe = format!("{COMPOSE_PLUGIN_COMMAND} version");
        match exec(&probe, None).await {
            Ok(_) => Self::new(COMPOSE_PLUGIN_COMMAND),
            Err(e) => {
                tracing::info!(
                    "`{}` unavailable ({}), using {}",
                    probe,
                    e,
                    COMPOSE_STANDALONE_COMMAND
                );
                Self::new(COMPOSE_STANDALONE_COMMAND)
            }
        }
    }
}

/// Execute a command line and return stdout
async fn exec(line: &str, dir: Option<&Path>) -> Result<String> {
    let output = command_from_line(line, dir)?
        .kill_on_drop(true)
        .output()
        .await
        .map_err(DockError::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(DockError::Compose {
            command: line.to_string(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[async_trait]
impl ComposeApi for ComposeCli {
    fn base_command(&self) -> &str {
        &self.command
    }

    async fn run(&self, command_line: &str, dir: Option<&Path>) -> Result<String> {
        tracing::debug!("Running `{}` in {:?}", command_line, dir);
        exec(command_line, dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line("docker compose   logs --tail=300 web"),
            vec!["docker", "compose", "logs", "--tail=300", "web"]
        );
        assert_eq!(
            split_command_line(r#"sh -c "echo 'hi there'""#),
            vec!["sh", "-c", "echo 'hi there'"]
        );
        assert_eq!(split_command_line("echo ''"), vec!["echo", ""]);
        assert!(split_command_line("   ").is_empty());
    }

    #[test]
    fn test_command_from_empty_line() {
        assert!(command_from_line("", None).is_err());
    }

    #[test]
    fn test_output_lines() {
        assert_eq!(output_lines("web\n\n  db  \n"), vec!["web", "db"]);
    }

    struct RecordingCompose {
        calls: Mutex<Vec<String>>,
        output: String,
    }

    #[async_trait]
    impl ComposeApi for RecordingCompose {
        fn base_command(&self) -> &str {
            "docker-compose -f a.yml"
        }

        async fn run(&self, command_line: &str, _dir: Option<&Path>) -> Result<String> {
            self.calls.lock().unwrap().push(command_line.to_string());
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn test_services_uses_base_command() {
        let compose = RecordingCompose {
            calls: Mutex::new(Vec::new()),
            output: "web\ndb\n".to_string(),
        };
        assert_eq!(compose.services(None).await.unwrap(), vec!["web", "db"]);
        assert_eq!(compose.service_count(None).await.unwrap(), 2);
        assert_eq!(
            compose.calls.lock().unwrap()[0],
            "docker-compose -f a.yml config --services"
        );
    }

    #[tokio::test]
    async fn test_detect_keeps_custom_command() {
        let cli = ComposeCli::detect("podman-compose").await;
        assert_eq!(cli.base_command(), "podman-compose");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_stderr() {
        let cli = ComposeCli::new("unused");
        let err = cli
            .run(r#"sh -c "echo boom >&2; exit 3""#, None)
            .await
            .unwrap_err();
        match err {
            DockError::Compose { command, stderr } => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cli = ComposeCli::new("unused");
        let out = cli.run("pwd", Some(dir.path())).await.unwrap();
        let reported = std::fs::canonicalize(out.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
