//! Actions for the dock-pilot TUI
//!
//! Actions represent events that can modify application state.

use dock_pilot_core::actions::ProjectAction;

/// Actions that can be dispatched in the application
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Navigation
    Quit,
    FocusNext,
    FocusPrev,
    /// The selected row of the focused panel changed
    SelectionChanged,
    /// Scope the dashboard to the selected project
    SelectProject,
    NextTab,
    PrevTab,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    /// Jump to the end of the main view and keep following output
    Follow,

    // Commands
    RunProjectAction(ProjectAction),
    RestartService,
    DismissError,

    // UI state
    Tick,
    Resize(u16, u16),
    Refresh,
}
