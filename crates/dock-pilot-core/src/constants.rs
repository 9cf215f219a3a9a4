//! Shared constants for Docker and compose
//!
//! Label keys written by compose, compose file names, and default
//! intervals used by the refresh loop and the metrics recorder.

// =============================================================================
// Container Labels
// =============================================================================

/// Explicit display name label
pub const LABEL_NAME: &str = "name";

pub const LABEL_COMPOSE_SERVICE: &str = "com.docker.compose.service";
pub const LABEL_COMPOSE_PROJECT: &str = "com.docker.compose.project";
pub const LABEL_COMPOSE_CONTAINER_NUMBER: &str = "com.docker.compose.container-number";
pub const LABEL_COMPOSE_ONEOFF: &str = "com.docker.compose.oneoff";
pub const LABEL_COMPOSE_WORKING_DIR: &str = "com.docker.compose.project.working_dir";
pub const LABEL_COMPOSE_CONFIG_FILES: &str = "com.docker.compose.project.config_files";

/// Value of the one-off label on one-off containers
pub const ONEOFF_TRUE: &str = "True";

/// Container state reported for running containers
pub const STATE_RUNNING: &str = "running";

// =============================================================================
// Compose Files
// =============================================================================

/// File names that mark a directory as a compose project root
pub const COMPOSE_FILE_NAMES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

// =============================================================================
// Defaults
// =============================================================================

/// Maximum display width of a project path
pub const MAX_PROJECT_PATH_LEN: usize = 30;

pub mod defaults {
    /// Trailing window of retained stats samples (seconds)
    pub const STATS_MAX_DURATION_SECS: u64 = 300;

    /// Inventory refresh interval (milliseconds)
    pub const REFRESH_INTERVAL_MS: u64 = 2000;

    /// Parallel inspection requests per refresh
    pub const INSPECT_CONCURRENCY: usize = 8;

    /// Time a cancelled activity gets to exit before the next one starts
    pub const STOP_TIMEOUT_MS: u64 = 2000;
}
