//! dock-pilot-core: refresh and task engine for dock-pilot
//!
//! This crate holds the dashboard's domain model and everything that keeps
//! it current: the container inventory, compose service and project
//! derivation, the stats recorder and the task manager that drives the main
//! panel. It has no TUI dependency so all of it is testable against fake
//! runtimes.
//!
//! # Modules
//!
//! - [`types`] - Containers, services, projects and stats samples
//! - [`inventory`] - Container listing, identity-preserving merge and inspection
//! - [`services`] - Compose service derivation for the current project
//! - [`projects`] - Project derivation and ordering
//! - [`refresh`] - Dashboard state and the refresh orchestrator
//! - [`metrics`] - Per-container stats monitoring within a retention window
//! - [`tasks`] - Cancellable main-panel tasks keyed by slot
//! - [`command`] - Command templates and their placeholder objects
//! - [`actions`] - Project up/down and log commands
//! - [`config`] - User configuration file
//! - [`indicators`] - Health indicators for containers and projects
//! - [`formatting`] - Bytes, durations, percentages and panel rows
//! - [`selection`] - Cursor state for list panels
//! - [`errors`] - User-facing error messages
//! - [`constants`] - Compose labels and defaults

pub mod actions;
pub mod command;
pub mod config;
pub mod constants;
pub mod errors;
pub mod formatting;
pub mod indicators;
pub mod inventory;
pub mod metrics;
pub mod projects;
pub mod refresh;
pub mod selection;
pub mod services;
pub mod tasks;
pub mod types;

pub use config::UserConfig;
pub use errors::*;
pub use formatting::*;
pub use indicators::*;
pub use inventory::Inventory;
pub use metrics::StatsRecorder;
pub use refresh::{DashboardEvent, DashboardState, Orchestrator};
pub use selection::*;
pub use tasks::{CancelHandle, CancelToken, RenderTarget, TaskManager, cancel_pair};
pub use types::*;
