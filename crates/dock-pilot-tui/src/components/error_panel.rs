//! Inline error panel for failed commands

use crate::action::Action;
use crate::components::Component;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

/// Popup showing the last command failure until dismissed
#[derive(Debug, Default)]
pub struct ErrorPanel {
    message: Option<String>,
}

impl ErrorPanel {
    pub fn show(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn is_visible(&self) -> bool {
        self.message.is_some()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl Component for ErrorPanel {
    /// Any key dismisses a visible panel
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        if self.is_visible() {
            return Ok(Some(Action::DismissError));
        }
        Ok(None)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::DismissError {
            self.message = None;
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let Some(message) = &self.message else {
            return Ok(());
        };

        let [popup] = Layout::horizontal([Constraint::Percentage(60)])
            .flex(Flex::Center)
            .areas(area);
        let [popup] = Layout::vertical([Constraint::Percentage(40)])
            .flex(Flex::Center)
            .areas(popup);

        let mut lines: Vec<Line> = message.lines().map(|l| Line::from(l.to_string())).collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::raw("Press any key to dismiss").dim()));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(" Error ")
                .title_style(Style::default().fg(Color::Red).bold())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(Clear, popup);
        frame.render_widget(paragraph, popup);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[test]
    fn test_any_key_dismisses() {
        let mut panel = ErrorPanel::default();
        let key = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(panel.handle_key_event(key).unwrap(), None);

        panel.show("compose up failed");
        assert_eq!(panel.handle_key_event(key).unwrap(), Some(Action::DismissError));
        panel.update(Action::DismissError).unwrap();
        assert!(!panel.is_visible());
    }
}
