//! dock-pilot-tui: terminal dashboard for Docker containers and compose projects
//!
//! The TUI is a thin layer over `dock-pilot-core`: it draws the published
//! dashboard state and turns key presses into main-view tasks and compose
//! commands.

pub mod action;
pub mod app;
pub mod components;
pub mod tui;
pub mod ui_ext;

pub use app::{App, AppContext};
