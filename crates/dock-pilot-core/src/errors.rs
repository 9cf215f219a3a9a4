//! Error formatting utilities
//!
//! User-friendly messages for runtime errors, and classification of compose
//! `config` failures.

use dock_rs::DockError;

/// Format a DockError into a user-friendly message
///
/// # Examples
///
/// ```
/// use dock_pilot_core::errors::format_dock_error;
/// use dock_rs::DockError;
///
/// let error = DockError::Connection("connection refused".to_string());
/// let message = format_dock_error(&error);
/// assert!(message.contains("refused"));
/// ```
pub fn format_dock_error(error: &DockError) -> String {
    match error {
        DockError::Connection(msg) => format_connection_error(msg),
        DockError::Api(e) => format_api_error(&e.to_string()),
        DockError::Tunnel(msg) => format!("SSH tunnel failed: {}", msg),
        DockError::ConfigNotFound(path) => format!("Config not found: {}", path),
        DockError::ConfigInvalid(msg) => format!("Invalid config: {}", msg),
        DockError::ContextNotFound(ctx) => {
            format!("Docker context '{}' not found - check `docker context ls`", ctx)
        }
        DockError::EndpointNotFound(ctx) => {
            format!("Docker context '{}' has no docker endpoint", ctx)
        }
        DockError::Compose { stderr, .. } => stderr.clone(),
        _ => error.to_string(),
    }
}

fn format_connection_error(msg: &str) -> String {
    let lower = msg.to_lowercase();
    if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        "TLS/certificate error - check DOCKER_CERT_PATH".to_string()
    } else if lower.contains("refused") {
        "Connection refused - is the docker daemon running?".to_string()
    } else if lower.contains("timeout") {
        "Connection timed out - daemon may be slow or unreachable".to_string()
    } else {
        format!("Connection failed: {}", msg)
    }
}

fn format_api_error(msg: &str) -> String {
    let lower = msg.to_lowercase();
    if lower.contains("permission denied") {
        "Permission denied - is your user in the docker group?".to_string()
    } else if lower.contains("no such container") || lower.contains("404") {
        "Container no longer exists".to_string()
    } else if lower.contains("refused") || lower.contains("no such file") {
        "Cannot reach the docker daemon".to_string()
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "Request timed out".to_string()
    } else {
        format!("Docker API error: {}", msg)
    }
}

/// Category label plus the friendly message, for the status line
pub fn describe_error(error: &DockError) -> String {
    format!("{}: {}", categorize_error(error).label(), format_dock_error(error))
}

/// Categorize an error for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Auth,
    Config,
    Timeout,
    NotFound,
    /// Compose CLI failures
    Compose,
    Other,
}

impl ErrorCategory {
    /// Get a short label for the category
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network",
            ErrorCategory::Auth => "Auth",
            ErrorCategory::Config => "Config",
            ErrorCategory::Timeout => "Timeout",
            ErrorCategory::NotFound => "Not Found",
            ErrorCategory::Compose => "Compose",
            ErrorCategory::Other => "Error",
        }
    }
}

/// Categorize a DockError
pub fn categorize_error(error: &DockError) -> ErrorCategory {
    match error {
        DockError::Connection(msg) => {
            let lower = msg.to_lowercase();
            if lower.contains("timeout") {
                ErrorCategory::Timeout
            } else if lower.contains("certificate") || lower.contains("tls") {
                ErrorCategory::Auth
            } else {
                ErrorCategory::Network
            }
        }
        DockError::Api(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("permission denied") {
                ErrorCategory::Auth
            } else if msg.contains("no such container") {
                ErrorCategory::NotFound
            } else if msg.contains("timed out") {
                ErrorCategory::Timeout
            } else {
                ErrorCategory::Network
            }
        }
        DockError::Tunnel(_) => ErrorCategory::Network,
        DockError::ConfigNotFound(_)
        | DockError::ConfigInvalid(_)
        | DockError::ContextNotFound(_)
        | DockError::EndpointNotFound(_) => ErrorCategory::Config,
        DockError::Compose { .. } => ErrorCategory::Compose,
        _ => ErrorCategory::Other,
    }
}

/// Kind of failure reported by `compose config`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeErrorKind {
    FileNotFound,
    Yaml,
    Validation,
    Other,
}

impl ComposeErrorKind {
    /// Classify compose output by the phrases compose uses for each failure
    pub fn classify(message: &str) -> Self {
        if message.contains("no configuration file provided") || message.contains("not found") {
            ComposeErrorKind::FileNotFound
        } else if message.contains("yaml:") || message.contains("parsing") {
            ComposeErrorKind::Yaml
        } else if message.contains("error decoding")
            || message.contains("validation failed")
            || message.contains("invalid")
        {
            ComposeErrorKind::Validation
        } else {
            ComposeErrorKind::Other
        }
    }
}

/// Message shown in the config tab when `compose config` fails
pub fn format_compose_config_error(project_name: &str, project_path: &str, message: &str) -> String {
    match ComposeErrorKind::classify(message) {
        ComposeErrorKind::FileNotFound => format!(
            "No compose file found for project '{}'\n\nPath: {}\n\n{}",
            project_name, project_path, message
        ),
        ComposeErrorKind::Yaml => {
            format!("Compose file has a YAML syntax error:\n\n{}", message)
        }
        ComposeErrorKind::Validation => {
            format!("Compose file failed validation:\n\n{}", message)
        }
        ComposeErrorKind::Other => format!("Could not load compose config:\n\n{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_connection_error() {
        assert!(format_connection_error("connection refused").contains("refused"));
        assert!(format_connection_error("TLS handshake failed").contains("TLS"));
        assert!(format_connection_error("timeout").contains("timed out"));
    }

    #[test]
    fn test_format_compose_error_is_stderr() {
        let error = DockError::Compose {
            command: "docker compose up -d".to_string(),
            stderr: "service \"web\" has no image".to_string(),
        };
        assert_eq!(format_dock_error(&error), "service \"web\" has no image");
        assert_eq!(categorize_error(&error), ErrorCategory::Compose);
    }

    #[test]
    fn test_describe_error_prefixes_category() {
        let error = DockError::Connection("connection refused".to_string());
        let described = describe_error(&error);
        assert!(described.starts_with("Network: "));
        assert!(described.contains("daemon running"));
    }

    #[test]
    fn test_categorize_config_error() {
        let error = DockError::ContextNotFound("remote".to_string());
        assert_eq!(categorize_error(&error), ErrorCategory::Config);

        let error = DockError::EndpointNotFound("remote".to_string());
        assert_eq!(categorize_error(&error), ErrorCategory::Config);
        assert!(format_dock_error(&error).contains("no docker endpoint"));
    }

    #[test]
    fn test_classify_compose_errors() {
        assert_eq!(
            ComposeErrorKind::classify("no configuration file provided: not found"),
            ComposeErrorKind::FileNotFound
        );
        assert_eq!(
            ComposeErrorKind::classify("yaml: line 3: mapping values are not allowed"),
            ComposeErrorKind::Yaml
        );
        assert_eq!(
            ComposeErrorKind::classify("services.web.ports must be a list: validation failed"),
            ComposeErrorKind::Validation
        );
        assert_eq!(
            ComposeErrorKind::classify("permission denied"),
            ComposeErrorKind::Other
        );
    }

    #[test]
    fn test_format_compose_config_error() {
        let msg = format_compose_config_error("shop", "/srv/shop", "no configuration file provided");
        assert!(msg.contains("'shop'"));
        assert!(msg.contains("/srv/shop"));

        let msg = format_compose_config_error("shop", "/srv/shop", "yaml: bad indent");
        assert!(msg.starts_with("Compose file has a YAML syntax error"));
    }
}
