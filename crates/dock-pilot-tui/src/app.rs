//! Application state and main loop

use crate::action::Action;
use crate::components::main_view::{cache_key, credits_text, stats_text};
use crate::components::{Component, ErrorPanel, ListPanel, MainTab, MainView, Panel};
use crate::tui::{self, Tui};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dock_pilot_core::actions::{self, ProjectAction};
use dock_pilot_core::{
    CancelHandle, Container, DashboardEvent, DashboardState, Orchestrator, Project, RenderTarget,
    Service, StatsRecorder, TaskManager, UserConfig, cancel_pair, describe_error,
    format_dock_error,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

/// Render slot of the main view
const MAIN_SLOT: &str = "main";

/// How often the stats tab redraws from recorded samples
const STATS_RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Everything the app drives, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub orchestrator: Arc<Orchestrator>,
    pub tasks: Arc<TaskManager>,
    pub recorder: Arc<StatsRecorder>,
    pub config: UserConfig,
    /// Whether the dashboard is scoped to a compose project
    pub compose_mode: bool,
}

/// Results from background commands
#[derive(Debug)]
enum AsyncResult {
    CommandDone(String),
    CommandFailed(String),
}

/// Panels in focus order
fn focus_order(compose_mode: bool) -> &'static [Panel] {
    if compose_mode {
        &[Panel::Projects, Panel::Services, Panel::Containers]
    } else {
        &[Panel::Projects, Panel::Containers]
    }
}

fn cycle_focus(compose_mode: bool, current: Panel, forward: bool) -> Panel {
    let order = focus_order(compose_mode);
    let index = order.iter().position(|p| *p == current).unwrap_or(0);
    let next = if forward {
        (index + 1) % order.len()
    } else {
        (index + order.len() - 1) % order.len()
    };
    order[next]
}

/// Keys that act regardless of the focused panel
fn global_action(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => Action::FocusNext,
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => Action::FocusPrev,
        KeyCode::Char(']') => Action::NextTab,
        KeyCode::Char('[') => Action::PrevTab,
        KeyCode::Char('K') => Action::ScrollUp,
        KeyCode::Char('J') => Action::ScrollDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::End => Action::Follow,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Char('u') => Action::RunProjectAction(ProjectAction::Up),
        KeyCode::Char('d') => Action::RunProjectAction(ProjectAction::Down),
        KeyCode::Char('D') => Action::RunProjectAction(ProjectAction::DownWithVolumes),
        KeyCode::Char('R') => Action::RestartService,
        _ => return None,
    };
    Some(action)
}

/// Main application state
pub struct App {
    ctx: AppContext,
    should_quit: bool,
    focus: Panel,
    state: DashboardState,
    projects: ListPanel<Project>,
    services: ListPanel<Service>,
    containers: ListPanel<Arc<Container>>,
    main: MainView,
    error: ErrorPanel,
    /// Last refresh failure, shown in the header until a refresh succeeds
    refresh_error: Option<String>,
    /// Outcome of the last finished command
    status: Option<String>,
    /// Cache key the main view was last rendered for
    rendered_key: Option<String>,
    tick_rate: Duration,
    events_tx: mpsc::UnboundedSender<DashboardEvent>,
    events_rx: mpsc::UnboundedReceiver<DashboardEvent>,
    action_tx: mpsc::UnboundedSender<AsyncResult>,
    action_rx: mpsc::UnboundedReceiver<AsyncResult>,
    refresh_loop: Option<CancelHandle>,
}

impl App {
    pub fn new(ctx: AppContext) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let focus = if ctx.compose_mode {
            Panel::Services
        } else {
            Panel::Containers
        };
        let state = ctx.orchestrator.snapshot();
        let mut app = Self {
            main: MainView::new(ctx.config.gui.wrap_main_panel),
            ctx,
            should_quit: false,
            focus,
            state,
            projects: ListPanel::new("Projects", " Not in a compose project"),
            services: ListPanel::new("Services", " No services"),
            containers: ListPanel::new("Containers", " No containers"),
            error: ErrorPanel::default(),
            refresh_error: None,
            status: None,
            rendered_key: None,
            tick_rate: Duration::from_millis(100),
            events_tx,
            events_rx,
            action_tx,
            action_rx,
            refresh_loop: None,
        };
        app.set_focus(focus);
        app
    }

    /// Run the application
    pub async fn run(&mut self) -> Result<()> {
        tui::install_panic_hook();
        let mut terminal = tui::init()?;

        let result = self.main_loop(&mut terminal).await;

        self.shutdown().await;
        tui::restore()?;

        result
    }

    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        match self.ctx.orchestrator.refresh().await {
            Ok(state) => self.apply_state(state).await,
            Err(e) => {
                tracing::error!("Initial refresh failed: {}", e);
                self.refresh_error = Some(describe_error(&e));
            }
        }
        self.render_main(true).await;
        self.start_refresh_loop();

        loop {
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(self.tick_rate)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = self.handle_key_event(key)? {
                            self.handle_action(action).await?;
                        }
                    }
                    Event::Resize(w, h) => {
                        self.handle_action(Action::Resize(w, h)).await?;
                    }
                    _ => {}
                }
            } else {
                self.handle_action(Action::Tick).await?;
            }

            while let Ok(event) = self.events_rx.try_recv() {
                match event {
                    DashboardEvent::Refreshed(state) => {
                        self.refresh_error = None;
                        self.apply_state(state).await;
                    }
                    DashboardEvent::RefreshFailed(message) => {
                        self.refresh_error = Some(message);
                    }
                }
            }

            while let Ok(result) = self.action_rx.try_recv() {
                match result {
                    AsyncResult::CommandDone(message) => {
                        self.status = Some(message);
                        self.spawn_refresh();
                    }
                    AsyncResult::CommandFailed(message) => {
                        self.error.show(message);
                        self.spawn_refresh();
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn start_refresh_loop(&mut self) {
        let (handle, token) = cancel_pair();
        self.ctx.orchestrator.spawn_refresh_loop(
            self.ctx.config.refresh.interval(),
            self.events_tx.clone(),
            token,
        );
        self.refresh_loop = Some(handle);
    }

    async fn shutdown(&mut self) {
        if let Some(handle) = self.refresh_loop.take() {
            handle.cancel();
        }
        self.ctx.tasks.stop_all().await;
        self.ctx.recorder.shutdown();
    }

    /// One refresh pass outside the loop, reported like a loop pass
    fn spawn_refresh(&self) {
        let orchestrator = self.ctx.orchestrator.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match orchestrator.refresh().await {
                Ok(state) => DashboardEvent::Refreshed(state),
                Err(e) => DashboardEvent::RefreshFailed(describe_error(&e)),
            };
            let _ = events.send(event);
        });
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.error.is_visible() {
            return self.error.handle_key_event(key);
        }
        if let Some(action) = global_action(key) {
            return Ok(Some(action));
        }
        match self.focus {
            Panel::Projects => self.projects.handle_key_event(key),
            Panel::Services => self.services.handle_key_event(key),
            Panel::Containers => self.containers.handle_key_event(key),
        }
    }

    async fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::FocusNext | Action::FocusPrev => {
                let forward = action == Action::FocusNext;
                self.set_focus(cycle_focus(self.ctx.compose_mode, self.focus, forward));
                self.render_main(false).await;
            }
            Action::SelectionChanged => {
                self.render_main(false).await;
            }
            Action::SelectProject => {
                self.select_project().await;
            }
            Action::NextTab | Action::PrevTab => {
                self.main.update(action)?;
                self.render_main(false).await;
            }
            Action::ScrollUp
            | Action::ScrollDown
            | Action::PageUp
            | Action::PageDown
            | Action::Follow => {
                self.main.update(action)?;
            }
            Action::RunProjectAction(project_action) => {
                self.run_project_action(project_action);
            }
            Action::RestartService => {
                self.restart_service();
            }
            Action::DismissError => {
                self.error.update(action)?;
            }
            Action::Refresh => {
                tracing::info!("Refresh requested");
                self.spawn_refresh();
                self.render_main(true).await;
            }
            Action::Tick | Action::Resize(_, _) => {}
        }
        Ok(())
    }

    fn set_focus(&mut self, focus: Panel) {
        self.focus = focus;
        self.projects.set_focused(focus == Panel::Projects);
        self.services.set_focused(focus == Panel::Services);
        self.containers.set_focused(focus == Panel::Containers);
    }

    async fn apply_state(&mut self, state: DashboardState) {
        let moved = [
            self.projects.set_items(state.projects.clone()),
            self.services.set_items(state.services.clone()),
            self.containers.set_items(state.containers.clone()),
        ];
        if moved.iter().any(|m| *m) {
            tracing::debug!("Selection moved after refresh");
        }
        self.state = state;

        self.render_main(false).await;
        if self.main.current_tab() == MainTab::Stats
            && let Some(container) = self.selected_container()
            && container.is_running()
        {
            self.ctx.recorder.ensure_monitoring(&container);
        }
    }

    async fn select_project(&mut self) {
        if self.focus != Panel::Projects || !self.ctx.compose_mode {
            return;
        }
        let Some(project) = self.projects.selected().cloned() else {
            return;
        };
        if self.state.current_project.as_ref().map(|p| &p.name) == Some(&project.name) {
            return;
        }
        tracing::info!(project = %project.name, "Switching project");
        self.ctx.orchestrator.select_project(Some(project.clone()));
        self.status = Some(format!("Switched to {}", project.name));
        self.state.current_project = Some(project);
        self.services.set_items(Vec::new());
        self.spawn_refresh();
        self.render_main(false).await;
    }

    /// Project an action applies to: the selected row, else the current project
    fn target_project(&self) -> Option<Project> {
        let selected = (self.focus == Panel::Projects)
            .then(|| self.projects.selected().cloned())
            .flatten();
        selected.or_else(|| self.state.current_project.clone())
    }

    fn run_project_action(&mut self, action: ProjectAction) {
        if !self.ctx.compose_mode {
            return;
        }
        let Some(project) = self.target_project() else {
            return;
        };
        self.status = Some(format!("Running {} for {}...", action.label(), project.name));

        let compose = self.ctx.orchestrator.compose().clone();
        let templates = self.ctx.config.command_templates.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result =
                match actions::run_project_action(compose.as_ref(), &templates, &project, action)
                    .await
                {
                    Ok(()) => AsyncResult::CommandDone(format!(
                        "{} finished for {}",
                        action.label(),
                        project.name
                    )),
                    Err(message) => AsyncResult::CommandFailed(message),
                };
            let _ = tx.send(result);
        });
    }

    fn restart_service(&mut self) {
        if self.focus != Panel::Services {
            return;
        }
        let (Some(project), Some(service)) = (
            self.state.current_project.clone(),
            self.services.selected().cloned(),
        ) else {
            return;
        };
        self.status = Some(format!("Restarting {}...", service.name));

        let compose = self.ctx.orchestrator.compose().clone();
        let templates = self.ctx.config.command_templates.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result =
                match actions::restart_service(compose.as_ref(), &templates, &project, &service)
                    .await
                {
                    Ok(()) => AsyncResult::CommandDone(format!("Restarted {}", service.name)),
                    Err(message) => AsyncResult::CommandFailed(message),
                };
            let _ = tx.send(result);
        });
    }

    fn selected_container(&self) -> Option<Arc<Container>> {
        match self.focus {
            Panel::Projects => None,
            Panel::Services => self.services.selected().and_then(|s| s.container.clone()),
            Panel::Containers => self.containers.selected().cloned(),
        }
    }

    fn selected_item(&self) -> (String, String) {
        match self.focus {
            Panel::Projects => match self.projects.selected() {
                Some(project) => (project.name.clone(), project.name.clone()),
                None => (String::new(), "dock-pilot".to_string()),
            },
            Panel::Services => match self.services.selected() {
                Some(service) => (service.name.clone(), service.name.clone()),
                None => (String::new(), String::new()),
            },
            Panel::Containers => match self.containers.selected() {
                Some(container) => (container.id().to_string(), container.name()),
                None => (String::new(), String::new()),
            },
        }
    }

    /// Point the main view at the focused selection
    ///
    /// Without `force` nothing happens while the cache key is unchanged, so
    /// periodic refreshes do not restart finished renders.
    async fn render_main(&mut self, force: bool) {
        let has_container = self
            .services
            .selected()
            .is_some_and(|s| s.container.is_some());
        self.main.set_tabs(MainTab::tabs_for(
            self.focus,
            self.ctx.compose_mode,
            has_container,
        ));
        let tab = self.main.current_tab();
        let (item_key, title) = self.selected_item();
        let key = cache_key(self.focus, &item_key, tab);

        if self.rendered_key.as_deref() == Some(key.as_str()) {
            if !force {
                return;
            }
        } else {
            self.main.reset_scroll();
        }
        self.rendered_key = Some(key.clone());
        self.main.set_title(title);
        tracing::debug!(cache_key = %key, "Rendering main view");

        match (self.focus, tab) {
            (_, MainTab::Credits) => {
                self.show_text(&key, credits_text(&self.ctx.config)).await;
            }
            (Panel::Projects, MainTab::Logs) => match self.projects.selected() {
                Some(project) => {
                    let command = actions::all_logs_command(
                        self.ctx.orchestrator.compose().as_ref(),
                        &self.ctx.config.command_templates,
                        project,
                    );
                    self.run_command(&key, command).await;
                }
                None => self.show_text(&key, "No project selected".to_string()).await,
            },
            (Panel::Projects, MainTab::Config) => match self.projects.selected().cloned() {
                Some(project) => {
                    let compose = self.ctx.orchestrator.compose().clone();
                    let templates = self.ctx.config.command_templates.clone();
                    self.ctx
                        .tasks
                        .run_render(MAIN_SLOT, Some(&key), self.main.buffer(), move || async move {
                            actions::compose_config_text(compose.as_ref(), &templates, &project)
                                .await
                        })
                        .await;
                }
                None => self.show_text(&key, "No project selected".to_string()).await,
            },
            (Panel::Services, MainTab::Logs) => match self.services.selected() {
                Some(service) => {
                    let command = actions::service_logs_command(
                        self.ctx.orchestrator.compose().as_ref(),
                        &self.ctx.config.command_templates,
                        self.state.current_project.as_ref(),
                        service,
                    );
                    self.run_command(&key, command).await;
                }
                None => self.show_text(&key, "No service selected".to_string()).await,
            },
            (Panel::Containers, MainTab::Logs) => match self.containers.selected() {
                Some(container) => {
                    let command = actions::container_logs_command(
                        self.ctx.orchestrator.compose().as_ref(),
                        &self.ctx.config.command_templates,
                        container,
                    );
                    self.run_command(&key, command).await;
                }
                None => self.show_text(&key, "No container selected".to_string()).await,
            },
            (_, MainTab::Stats) => match self.selected_container() {
                Some(container) => self.show_stats(&key, container).await,
                None => self.show_text(&key, "No container".to_string()).await,
            },
            (_, MainTab::Inspect) => match self.selected_container() {
                Some(container) => self.show_inspect(&key, container).await,
                None => self.show_text(&key, "No container selected".to_string()).await,
            },
            (_, tab) => {
                tracing::warn!("No renderer for {:?} in {:?}", tab, self.focus);
                self.show_text(&key, String::new()).await;
            }
        }
    }

    async fn show_text(&self, key: &str, text: String) {
        self.ctx
            .tasks
            .run_render(MAIN_SLOT, Some(key), self.main.buffer(), move || async move {
                text
            })
            .await;
    }

    async fn run_command(&self, key: &str, command: dock_rs::Result<Command>) {
        match command {
            Ok(command) => {
                self.ctx
                    .tasks
                    .run_process(MAIN_SLOT, Some(key), command, self.main.buffer())
                    .await;
            }
            Err(e) => {
                tracing::error!("Could not build command: {}", e);
                self.show_text(key, format_dock_error(&e)).await;
            }
        }
    }

    async fn show_stats(&self, key: &str, container: Arc<Container>) {
        if container.is_running() {
            self.ctx.recorder.ensure_monitoring(&container);
        }
        let target = self.main.buffer();
        self.ctx
            .tasks
            .run_keyed(MAIN_SLOT, key, move |cancel| async move {
                let mut ticker = tokio::time::interval(STATS_RENDER_INTERVAL);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            target.set_content(stats_text(&container));
                        }
                    }
                }
            })
            .await;
    }

    async fn show_inspect(&self, key: &str, container: Arc<Container>) {
        let runtime = self.ctx.orchestrator.inventory().runtime().clone();
        self.ctx
            .tasks
            .run_render(MAIN_SLOT, Some(key), self.main.buffer(), move || async move {
                match runtime.inspect_container(container.id()).await {
                    Ok(details) => {
                        let text = details.to_pretty_json();
                        container.set_details(details);
                        text
                    }
                    Err(e) => {
                        tracing::warn!(container_id = %container.id(), "Inspect failed: {}", e);
                        format_dock_error(&e)
                    }
                }
            })
            .await;
    }

    fn draw(&mut self, frame: &mut Frame) {
        let layout = Layout::vertical([
            Constraint::Length(2), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(2), // Footer
        ])
        .split(frame.area());

        self.draw_header(frame, layout[0]);

        let content = Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(layout[1]);

        if self.ctx.compose_mode {
            let side = Layout::vertical([
                Constraint::Percentage(25),
                Constraint::Percentage(35),
                Constraint::Percentage(40),
            ])
            .split(content[0]);
            let _ = self.projects.draw(frame, side[0]);
            let _ = self.services.draw(frame, side[1]);
            let _ = self.containers.draw(frame, side[2]);
        } else {
            let side = Layout::vertical([Constraint::Length(3), Constraint::Min(0)])
                .split(content[0]);
            let _ = self.projects.draw(frame, side[0]);
            let _ = self.containers.draw(frame, side[1]);
        }

        let _ = self.main.draw(frame, content[1]);
        self.draw_footer(frame, layout[2]);
        let _ = self.error.draw(frame, frame.area());
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::raw(" dock-pilot ").bold().fg(Color::Cyan)];
        if let Some(project) = &self.state.current_project {
            spans.push(Span::raw(format!(" {} ", project.name)).fg(Color::White));
        }
        spans.push(Span::raw(format!("  {} containers", self.state.containers.len())).dim());
        if let Some(error) = &self.refresh_error {
            let first_line = error.lines().next().unwrap_or_default();
            spans.push(Span::raw(format!("  ✗ {}", first_line)).fg(Color::Red));
        } else if let Some(status) = &self.status {
            spans.push(Span::raw(format!("  {}", status)).dim());
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(header, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let mut hints = vec![
            ("q", "quit"),
            ("tab", "focus"),
            ("↑↓", "select"),
            ("[ ]", "tabs"),
            ("J/K", "scroll"),
            ("r", "refresh"),
        ];
        if self.ctx.compose_mode {
            hints.extend([("enter", "project"), ("u/d/D", "up/down/down -v"), ("R", "restart")]);
        }

        let mut spans = Vec::new();
        for (key, label) in hints {
            spans.push(Span::raw(format!(" [{}]", key)).fg(Color::Yellow));
            spans.push(Span::raw(format!(" {} ", label)).dim());
        }
        let footer = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(footer, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_focus_cycles_through_modes() {
        assert_eq!(cycle_focus(true, Panel::Projects, true), Panel::Services);
        assert_eq!(cycle_focus(true, Panel::Containers, true), Panel::Projects);
        assert_eq!(cycle_focus(true, Panel::Projects, false), Panel::Containers);
        assert_eq!(cycle_focus(false, Panel::Projects, true), Panel::Containers);
    }

    #[test]
    fn test_services_panel_absent_outside_compose() {
        assert!(!focus_order(false).contains(&Panel::Services));
        assert_eq!(cycle_focus(false, Panel::Services, true), Panel::Containers);
    }

    #[test]
    fn test_global_keys() {
        assert_eq!(global_action(key(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(
            global_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(
            global_action(key(KeyCode::Char('D'))),
            Some(Action::RunProjectAction(ProjectAction::DownWithVolumes))
        );
        assert_eq!(global_action(key(KeyCode::Char(']'))), Some(Action::NextTab));
    }

    #[test]
    fn test_panel_keys_are_not_global() {
        assert_eq!(global_action(key(KeyCode::Down)), None);
        assert_eq!(global_action(key(KeyCode::Enter)), None);
        assert_eq!(global_action(key(KeyCode::Char('j'))), None);
    }
}
