//! Main view: tabbed output of the focused panel's selection
//!
//! Whatever the main view shows is produced by a background task writing
//! into a [`MainBuffer`]. The view itself only draws the buffer and tracks
//! tabs and scrolling.

use crate::action::Action;
use crate::components::Component;
use color_eyre::Result;
use dock_pilot_core::{
    Container, RenderTarget, UserConfig, format_duration_human, format_stats_summary,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Lines kept in the buffer; older output is dropped
const MAX_BUFFER_LINES: usize = 10_000;

/// Side panel the main view is showing output for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Projects,
    Services,
    Containers,
}

impl Panel {
    pub fn key(&self) -> &'static str {
        match self {
            Panel::Projects => "projects",
            Panel::Services => "services",
            Panel::Containers => "containers",
        }
    }
}

/// What the main view renders for a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MainTab {
    Logs,
    Stats,
    Inspect,
    Config,
    Credits,
}

impl MainTab {
    pub fn title(&self) -> &'static str {
        match self {
            MainTab::Logs => "Logs",
            MainTab::Stats => "Stats",
            MainTab::Inspect => "Inspect",
            MainTab::Config => "Config",
            MainTab::Credits => "Credits",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            MainTab::Logs => "logs",
            MainTab::Stats => "stats",
            MainTab::Inspect => "inspect",
            MainTab::Config => "config",
            MainTab::Credits => "credits",
        }
    }

    /// Tabs available for `panel`
    ///
    /// Project tabs depend on whether the dashboard runs in a compose
    /// project. Service stats need a container to read from.
    pub fn tabs_for(panel: Panel, compose_mode: bool, has_container: bool) -> Vec<MainTab> {
        match panel {
            Panel::Projects if compose_mode => {
                vec![MainTab::Logs, MainTab::Config, MainTab::Credits]
            }
            Panel::Projects => vec![MainTab::Credits],
            Panel::Services if has_container => vec![MainTab::Logs, MainTab::Stats],
            Panel::Services => vec![MainTab::Logs],
            Panel::Containers => vec![MainTab::Logs, MainTab::Stats, MainTab::Inspect],
        }
    }
}

/// Cache key of a main tab for one selected item, e.g. `projects-shop-logs`
pub fn cache_key(panel: Panel, item: &str, tab: MainTab) -> String {
    format!("{}-{}-{}", panel.key(), item, tab.key())
}

/// Output written by main-view tasks
#[derive(Debug, Default)]
pub struct MainBuffer {
    lines: Mutex<VecDeque<String>>,
}

impl MainBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn line_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RenderTarget for MainBuffer {
    fn clear(&self) {
        self.lock().clear();
    }

    fn write_line(&self, line: &str) {
        let mut lines = self.lock();
        if lines.len() >= MAX_BUFFER_LINES {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    fn set_content(&self, content: String) {
        let mut lines = self.lock();
        lines.clear();
        lines.extend(content.lines().map(String::from));
    }
}

/// Stats tab text for a container
pub fn stats_text(container: &Container) -> String {
    let samples = container.stats();
    let (Some(first), Some(latest)) = (samples.first(), samples.last()) else {
        return if container.is_running() {
            "Waiting for stats...".to_string()
        } else {
            format!("Container is {}", container.state())
        };
    };

    let span = latest.recorded_at - first.recorded_at;
    let peak_cpu = samples
        .iter()
        .map(|s| s.derived.cpu_percentage)
        .fold(0.0_f64, f64::max);
    let peak_mem = samples
        .iter()
        .map(|s| s.derived.memory_percentage)
        .fold(0.0_f64, f64::max);

    format!(
        "{}\n\nSamples: {} over {}\nPeak CPU: {:.2}%\nPeak memory: {:.2}%",
        format_stats_summary(latest),
        samples.len(),
        format_duration_human(span),
        peak_cpu,
        peak_mem,
    )
}

/// Credits tab text: title, links and the effective configuration
pub fn credits_text(config: &UserConfig) -> String {
    format!(
        "dock-pilot {}\n\nA terminal dashboard for Docker containers and compose projects.\n\n\
         Keys:   tab focus  [ ] tabs  u/d/D up/down/down -v  R restart  r refresh  q quit\n\
         Compose: https://docs.docker.com/compose/\n\n\
         Config:\n\n{}",
        env!("CARGO_PKG_VERSION"),
        config.to_yaml(),
    )
}

/// Tabbed main view
pub struct MainView {
    buffer: std::sync::Arc<MainBuffer>,
    title: String,
    tabs: Vec<MainTab>,
    selected_tab: usize,
    /// First visible row when not following
    scroll: usize,
    /// Keep the newest output in view
    follow: bool,
    wrap: bool,
    /// Inner height of the last draw, for paging
    last_height: usize,
}

impl MainView {
    pub fn new(wrap: bool) -> Self {
        Self {
            buffer: std::sync::Arc::new(MainBuffer::new()),
            title: String::new(),
            tabs: vec![MainTab::Credits],
            selected_tab: 0,
            scroll: 0,
            follow: true,
            wrap,
            last_height: 20,
        }
    }

    pub fn buffer(&self) -> std::sync::Arc<MainBuffer> {
        self.buffer.clone()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Replace the available tabs, keeping the current tab when it survives
    pub fn set_tabs(&mut self, tabs: Vec<MainTab>) {
        let current = self.current_tab();
        self.selected_tab = tabs.iter().position(|t| *t == current).unwrap_or(0);
        self.tabs = tabs;
    }

    pub fn tabs(&self) -> &[MainTab] {
        &self.tabs
    }

    pub fn current_tab(&self) -> MainTab {
        self.tabs
            .get(self.selected_tab)
            .copied()
            .unwrap_or(MainTab::Credits)
    }

    /// Start at the top of fresh output, following it
    pub fn reset_scroll(&mut self) {
        self.scroll = 0;
        self.follow = true;
    }

    fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.selected_tab = (self.selected_tab + 1) % self.tabs.len();
        }
    }

    fn prev_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.selected_tab = (self.selected_tab + self.tabs.len() - 1) % self.tabs.len();
        }
    }

    /// Rows the buffer occupies at `width`, counting wrapped lines
    fn row_count(&self, lines: &[String], width: usize) -> usize {
        if !self.wrap || width == 0 {
            return lines.len();
        }
        lines
            .iter()
            .map(|l| l.chars().count().div_ceil(width).max(1))
            .sum()
    }

    fn scroll_by(&mut self, delta: isize, bottom: usize) {
        if self.follow {
            self.scroll = bottom;
        }
        self.scroll = self.scroll.saturating_add_signed(delta).min(bottom);
        self.follow = self.scroll >= bottom;
    }
}

impl Component for MainView {
    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        let lines = self.buffer.lines();
        let bottom = self
            .row_count(&lines, usize::MAX)
            .saturating_sub(self.last_height);
        let page = self.last_height.max(1) as isize;
        match action {
            Action::NextTab => self.next_tab(),
            Action::PrevTab => self.prev_tab(),
            Action::ScrollUp => self.scroll_by(-1, bottom),
            Action::ScrollDown => self.scroll_by(1, bottom),
            Action::PageUp => self.scroll_by(-page, bottom),
            Action::PageDown => self.scroll_by(page, bottom),
            Action::Follow => self.follow = true,
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .title_style(Style::default().fg(Color::Cyan).bold())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let layout = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(inner);

        let titles: Vec<Line> = self
            .tabs
            .iter()
            .map(|t| Line::from(Span::raw(t.title())))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.selected_tab)
            .style(Style::default().fg(Color::DarkGray))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, layout[0]);

        let content_area = layout[1];
        self.last_height = content_area.height as usize;
        let lines = self.buffer.lines();
        let bottom = self
            .row_count(&lines, content_area.width as usize)
            .saturating_sub(self.last_height);
        let offset = if self.follow { bottom } else { self.scroll.min(bottom) };

        let text: Vec<Line> = lines.into_iter().map(Line::from).collect();
        let mut paragraph =
            Paragraph::new(text).scroll((offset.min(u16::MAX as usize) as u16, 0));
        if self.wrap {
            paragraph = paragraph.wrap(Wrap { trim: false });
        }
        frame.render_widget(paragraph, content_area);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use dock_pilot_core::RecordedStats;
    use dock_rs::{ContainerStats, ContainerSummary};
    use std::time::Duration;

    fn running_container() -> Container {
        Container::new(ContainerSummary {
            id: "abc".to_string(),
            state: "running".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_project_tabs_depend_on_mode() {
        assert_eq!(
            MainTab::tabs_for(Panel::Projects, true, false),
            vec![MainTab::Logs, MainTab::Config, MainTab::Credits]
        );
        assert_eq!(MainTab::tabs_for(Panel::Projects, false, false), vec![MainTab::Credits]);
    }

    #[test]
    fn test_service_stats_need_container() {
        assert_eq!(MainTab::tabs_for(Panel::Services, true, false), vec![MainTab::Logs]);
        assert_eq!(
            MainTab::tabs_for(Panel::Services, true, true),
            vec![MainTab::Logs, MainTab::Stats]
        );
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(Panel::Projects, "shop", MainTab::Logs), "projects-shop-logs");
    }

    #[test]
    fn test_set_tabs_keeps_current_tab() {
        let mut view = MainView::new(true);
        view.set_tabs(MainTab::tabs_for(Panel::Containers, true, true));
        view.update(Action::NextTab).unwrap();
        assert_eq!(view.current_tab(), MainTab::Stats);

        view.set_tabs(MainTab::tabs_for(Panel::Services, true, true));
        assert_eq!(view.current_tab(), MainTab::Stats);

        view.set_tabs(MainTab::tabs_for(Panel::Services, true, false));
        assert_eq!(view.current_tab(), MainTab::Logs);
    }

    #[test]
    fn test_prev_tab_wraps() {
        let mut view = MainView::new(false);
        view.set_tabs(MainTab::tabs_for(Panel::Containers, true, true));
        view.update(Action::PrevTab).unwrap();
        assert_eq!(view.current_tab(), MainTab::Inspect);
    }

    #[test]
    fn test_buffer_caps_lines() {
        let buffer = MainBuffer::new();
        for i in 0..MAX_BUFFER_LINES + 5 {
            buffer.write_line(&i.to_string());
        }
        assert_eq!(buffer.line_count(), MAX_BUFFER_LINES);
        assert_eq!(buffer.lines()[0], "5");

        buffer.set_content("a\nb".to_string());
        assert_eq!(buffer.lines(), vec!["a", "b"]);
        buffer.clear();
        assert_eq!(buffer.line_count(), 0);
    }

    #[test]
    fn test_scrolling_leaves_and_resumes_follow() {
        let mut view = MainView::new(false);
        view.last_height = 10;
        for i in 0..30 {
            view.buffer.write_line(&i.to_string());
        }

        view.update(Action::ScrollUp).unwrap();
        assert!(!view.follow);
        assert_eq!(view.scroll, 19);

        view.update(Action::PageDown).unwrap();
        assert!(view.follow);
    }

    #[test]
    fn test_stats_text_without_samples() {
        assert_eq!(stats_text(&running_container()), "Waiting for stats...");
    }

    #[test]
    fn test_stats_text_reports_peaks() {
        let container = running_container();
        let now = Utc::now();
        for (secs, cpu) in [(0, 10.0), (5, 55.5), (10, 20.0)] {
            let mut sample =
                RecordedStats::new(ContainerStats::default(), now + ChronoDuration::seconds(secs));
            sample.derived.cpu_percentage = cpu;
            container.append_stats(sample, Duration::from_secs(300));
        }

        let text = stats_text(&container);
        assert!(text.contains("Samples: 3 over 10s"));
        assert!(text.contains("Peak CPU: 55.50%"));
    }

    #[test]
    fn test_credits_include_config() {
        let text = credits_text(&UserConfig::default());
        assert!(text.contains("commandTemplates"));
    }
}
