//! Component system for the dock-pilot TUI
//!
//! Based on the ratatui Component template pattern.

pub mod error_panel;
pub mod main_view;
pub mod panels;

pub use error_panel::ErrorPanel;
pub use main_view::{MainBuffer, MainTab, MainView, Panel};
pub use panels::{ListPanel, PanelRow};

use crate::action::Action;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

/// Trait for UI components
///
/// Components are modular, reusable UI elements that can handle events,
/// update their state, and render themselves.
pub trait Component {
    /// Handle key events and optionally produce actions
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Update the component state based on an action
    fn update(&mut self, action: Action) -> Result<Option<Action>>;

    /// Render the component to the frame
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}
