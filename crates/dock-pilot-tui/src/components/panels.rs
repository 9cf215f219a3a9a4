//! Side panels listing projects, services and containers

use crate::action::Action;
use crate::components::Component;
use crate::ui_ext::health_span_parts;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use dock_pilot_core::{
    Container, Project, SelectableList, Service, container_display_strings, project_display_strings,
    truncate_string,
};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};
use std::sync::Arc;

/// An item that can be shown as one panel row
pub trait PanelRow {
    /// Identity used to keep the selection across refreshes
    fn key(&self) -> String;

    fn row(&self) -> Line<'static>;
}

impl PanelRow for Project {
    fn key(&self) -> String {
        self.name.clone()
    }

    fn row(&self) -> Line<'static> {
        let (symbol, color) = health_span_parts(self);
        let [_, name, counts, services, path] = project_display_strings(self);
        Line::from(vec![
            Span::raw(format!(" {} ", symbol)).fg(color),
            Span::raw(format!("{:<20}", truncate_string(&name, 20))),
            Span::raw(format!(" {:>5}", counts)).dim(),
            Span::raw(format!(" {:>3} svc", services)).dim(),
            Span::raw(format!("  {}", path)).fg(Color::DarkGray),
        ])
    }
}

impl PanelRow for Service {
    fn key(&self) -> String {
        self.name.clone()
    }

    fn row(&self) -> Line<'static> {
        let (symbol, color) = health_span_parts(self);
        let status = match &self.container {
            Some(container) => container.info().summary.status,
            None => "not created".to_string(),
        };
        Line::from(vec![
            Span::raw(format!(" {} ", symbol)).fg(color),
            Span::raw(format!("{:<20}", self.name)),
            Span::raw(format!(" {}", status)).dim(),
        ])
    }
}

impl PanelRow for Arc<Container> {
    fn key(&self) -> String {
        self.id().to_string()
    }

    fn row(&self) -> Line<'static> {
        let (symbol, color) = health_span_parts(&**self);
        let [_, name, status, cpu, mem] = container_display_strings(self);
        Line::from(vec![
            Span::raw(format!(" {} ", symbol)).fg(color),
            Span::raw(format!("{:<28}", truncate_string(&name, 28))),
            Span::raw(format!(" {:>7}", cpu)).fg(Color::Cyan),
            Span::raw(format!(" {:>7}", mem)).fg(Color::Magenta),
            Span::raw(format!("  {}", status)).dim(),
        ])
    }
}

/// A titled list panel with a cursor that follows items by key
pub struct ListPanel<T> {
    title: &'static str,
    empty_text: &'static str,
    list: SelectableList<T>,
    list_state: ListState,
    focused: bool,
}

impl<T: PanelRow> ListPanel<T> {
    pub fn new(title: &'static str, empty_text: &'static str) -> Self {
        Self {
            title,
            empty_text,
            list: SelectableList::default(),
            list_state: ListState::default(),
            focused: false,
        }
    }

    /// Replace the rows; returns true when the selected item changed
    pub fn set_items(&mut self, items: Vec<T>) -> bool {
        let before = self.selected_key();
        self.list.update_items_by(items, |item: &T| item.key());
        before != self.selected_key()
    }

    pub fn selected(&self) -> Option<&T> {
        self.list.selected()
    }

    pub fn selected_key(&self) -> Option<String> {
        self.list.selected().map(|item| item.key())
    }

    /// Move the cursor to the item with `key`, if present
    pub fn select_key(&mut self, key: &str) -> bool {
        self.list.select_where(|item| item.key() == key)
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<T: PanelRow> Component for ListPanel<T> {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let before = self.list.selected_index();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_next(),
            KeyCode::Home | KeyCode::Char('g') => self.list.select(0),
            KeyCode::Char('G') => self.list.select(usize::MAX),
            KeyCode::Enter => return Ok(Some(Action::SelectProject)),
            _ => return Ok(None),
        }
        if self.list.selected_index() == before {
            return Ok(None);
        }
        Ok(Some(Action::SelectionChanged))
    }

    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let items: Vec<ListItem> = if self.list.is_empty() {
            vec![ListItem::new(Line::from(Span::raw(self.empty_text).dim()))]
        } else {
            self.list
                .items()
                .iter()
                .map(|item| ListItem::new(item.row()))
                .collect()
        };

        let border_color = if self.focused { Color::Cyan } else { Color::DarkGray };
        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!(" {} ", self.title))
                    .title_style(Style::default().fg(Color::Cyan).bold())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color)),
            )
            .highlight_style(if self.focused {
                Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            });

        self.list_state
            .select((!self.list.is_empty()).then_some(self.list.selected_index()));
        frame.render_stateful_widget(list, area, &mut self.list_state);
        Ok(())
    }
}
