pub mod menu;
pub mod state;

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent};

use crate::config::PaneSpec;
use crate::layout::Rect;
use crate::process_manager::{
    CommandSpec, EventOutcome, ProcessEvent, ProcessPhase, ProcessSupervisor, RespawnReason,
    Spawner,
};
use crate::state::StateOptions;
use crate::ui::theme::Theme;
use crate::watch::{WatchEvent, WatchPattern};

use self::menu::{item_for_key, step_selection, MenuItem, PaneAction, MENU_ITEMS};
use self::state::{LogKind, PaneKey, PaneState, PaneValue, ProcessStatus};

const TEXT_KEYS: &[PaneKey] = &[PaneKey::Data, PaneKey::ShowErrors, PaneKey::ShowLogs];

/// Everything a pane borrows from the dashboard at construction.
#[derive(Clone)]
pub struct PaneContext {
    pub spawner: Arc<dyn Spawner>,
    pub events: Sender<ProcessEvent>,
    pub cwd: PathBuf,
    pub theme: Theme,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMove {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// No exit code yet.
    Pending,
    Success,
    Failure,
}

impl StatusClass {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            None => StatusClass::Pending,
            Some(0) => StatusClass::Success,
            Some(_) => StatusClass::Failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaneLabel {
    pub title: String,
    pub status: StatusClass,
    pub detail: String,
    pub show_errors: bool,
    pub show_logs: bool,
    pub render_count: usize,
    pub style: anstyle::Style,
}

impl fmt::Display for PaneLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " ■ {} [{}] - {} stderr | {} logs ({}) ",
            self.title,
            self.detail,
            mark(self.show_errors),
            mark(self.show_logs),
            self.render_count
        )
    }
}

fn mark(on: bool) -> &'static str {
    if on {
        "✓"
    } else {
        "✗"
    }
}

/// What the rendering surface needs from a pane.
pub trait Renderable {
    fn visible_text(&self) -> &str;
    fn label(&self) -> PaneLabel;
    fn take_focus_request(&mut self) -> Option<FocusMove>;
}

/// One interactive unit: a layout slot, a supervised process and the state
/// both of them publish into.
pub struct Pane {
    slug: String,
    title: String,
    rect: Rect,
    theme: Theme,
    state: PaneState,
    supervisor: ProcessSupervisor,
    visible_text: String,
    render_count: usize,
    focus_request: Option<FocusMove>,
}

impl Pane {
    /// Builds the pane and starts its process.
    pub fn new(slug: impl Into<String>, spec: &PaneSpec, rect: Rect, context: &PaneContext) -> Self {
        let slug = slug.into();
        let state = PaneState::with_options(
            [
                (PaneKey::ShowErrors, PaneValue::Flag(spec.stderr_visible)),
                (PaneKey::ShowLogs, PaneValue::Flag(false)),
                (PaneKey::IsFullScreen, PaneValue::Flag(false)),
                (PaneKey::IsMenuVisible, PaneValue::Flag(false)),
                (PaneKey::MenuSelection, PaneValue::Count(0)),
                (PaneKey::Restarts, PaneValue::Count(0)),
            ],
            StateOptions {
                window: context.window,
                ..StateOptions::default()
            },
        );
        let supervisor = ProcessSupervisor::new(
            slug.clone(),
            CommandSpec {
                cmd: spec.cmd.clone(),
                args: spec.args.clone(),
                cwd: context.cwd.clone(),
                clear_on_restart: spec.clear_on_restart,
            },
            spec.watch_glob().map(WatchPattern::new),
            Arc::clone(&context.spawner),
            context.events.clone(),
        );
        let mut pane = Self {
            title: spec.label_or(&slug).to_owned(),
            slug,
            rect,
            theme: context.theme,
            state,
            supervisor,
            visible_text: String::new(),
            render_count: 0,
            focus_request: None,
        };
        pane.supervisor
            .respawn(&mut pane.state, RespawnReason::Initial);
        pane
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn effective_rect(&self) -> Rect {
        if self.is_full_screen() {
            Rect::full(self.slug.clone())
        } else {
            self.rect.clone()
        }
    }

    pub fn is_full_screen(&self) -> bool {
        self.state.flag(PaneKey::IsFullScreen)
    }

    pub fn is_menu_visible(&self) -> bool {
        self.state.flag(PaneKey::IsMenuVisible)
    }

    pub fn menu_items(&self) -> &'static [MenuItem] {
        MENU_ITEMS
    }

    pub fn menu_selection(&self) -> usize {
        self.state.count(PaneKey::MenuSelection)
    }

    pub fn status(&self) -> ProcessStatus {
        self.state.status()
    }

    pub fn restarts(&self) -> usize {
        self.supervisor.restarts()
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn state(&self) -> &PaneState {
        &self.state
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Routes a key press. Returns false when the pane had no use for it.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if self.is_menu_visible() {
            self.handle_menu_key(key)
        } else {
            self.handle_pane_key(key)
        }
    }

    fn handle_menu_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Enter => {
                let item = MENU_ITEMS[self.menu_selection().min(MENU_ITEMS.len() - 1)];
                self.run_menu_item(item.action);
            }
            KeyCode::Char('w') | KeyCode::Esc => self.set_menu_visible(false),
            KeyCode::Tab | KeyCode::BackTab => {
                self.set_menu_visible(false);
                self.request_focus(key.code);
            }
            KeyCode::Char(c) => match item_for_key(c) {
                Some(item) => self.run_menu_item(item.action),
                None => return false,
            },
            _ => return false,
        }
        true
    }

    fn handle_pane_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('w') => {
                self.state.set([
                    (PaneKey::IsMenuVisible, PaneValue::Flag(true)),
                    (PaneKey::MenuSelection, PaneValue::Count(0)),
                ]);
            }
            KeyCode::Esc => {
                self.state.set([
                    (PaneKey::IsFullScreen, PaneValue::Flag(false)),
                    (PaneKey::IsMenuVisible, PaneValue::Flag(false)),
                ]);
            }
            KeyCode::Enter => self.apply_action(PaneAction::Respawn),
            KeyCode::Tab | KeyCode::BackTab => self.request_focus(key.code),
            KeyCode::Char(c @ ('q' | 'e' | 'r' | 'f')) => match item_for_key(c) {
                Some(item) => self.apply_action(item.action),
                None => return false,
            },
            _ => return false,
        }
        true
    }

    fn run_menu_item(&mut self, action: PaneAction) {
        self.apply_action(action);
        self.set_menu_visible(false);
    }

    pub fn apply_action(&mut self, action: PaneAction) {
        match action {
            PaneAction::ClearLog => {
                self.state.clear_log().push_log(LogKind::Log, "log cleared");
            }
            PaneAction::ToggleErrors => self.toggle(PaneKey::ShowErrors),
            PaneAction::ToggleLogs => self.toggle(PaneKey::ShowLogs),
            PaneAction::ToggleFullScreen => self.toggle(PaneKey::IsFullScreen),
            PaneAction::Respawn => self
                .supervisor
                .respawn(&mut self.state, RespawnReason::Manual),
        }
    }

    pub fn handle_process_event(&mut self, event: ProcessEvent) -> EventOutcome {
        self.supervisor.handle_event(&mut self.state, event)
    }

    pub fn handle_file_change(&mut self, event: &WatchEvent) -> bool {
        self.supervisor.handle_file_change(&mut self.state, event)
    }

    /// Releases a coalesced change once its window has passed. Returns true
    /// when the pane needs a redraw.
    pub fn poll_render(&mut self, now: Instant) -> bool {
        let Some(change) = self.state.poll_update(now) else {
            return false;
        };
        if change.is_noop() {
            return false;
        }
        if change.has_changed(TEXT_KEYS) {
            self.visible_text = self.filter_log();
        }
        self.render_count += 1;
        true
    }

    pub fn render_deadline(&self) -> Option<Instant> {
        self.state.update_deadline()
    }

    pub fn shutdown(&mut self) {
        self.supervisor.shutdown();
    }

    fn filter_log(&self) -> String {
        let show_errors = self.state.flag(PaneKey::ShowErrors);
        let show_logs = self.state.flag(PaneKey::ShowLogs);
        let mut text = String::new();
        for entry in self.state.log().iter() {
            match entry.kind {
                LogKind::Stdout => text.push_str(&entry.content),
                LogKind::Stderr if show_errors => text.push_str(&entry.content),
                LogKind::Log if show_logs => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                    text.push_str("### ");
                    text.push_str(&entry.content);
                    text.push('\n');
                }
                _ => {}
            }
        }
        text
    }

    fn toggle(&mut self, key: PaneKey) {
        let next = !self.state.flag(key);
        self.state.set([(key, PaneValue::Flag(next))]);
    }

    fn set_menu_visible(&mut self, visible: bool) {
        self.state
            .set([(PaneKey::IsMenuVisible, PaneValue::Flag(visible))]);
    }

    fn move_selection(&mut self, delta: isize) {
        let next = step_selection(self.menu_selection(), delta);
        self.state
            .set([(PaneKey::MenuSelection, PaneValue::Count(next))]);
    }

    fn request_focus(&mut self, code: KeyCode) {
        if self.is_full_screen() {
            return;
        }
        self.focus_request = Some(match code {
            KeyCode::BackTab => FocusMove::Previous,
            _ => FocusMove::Next,
        });
    }
}

impl Renderable for Pane {
    fn visible_text(&self) -> &str {
        &self.visible_text
    }

    fn label(&self) -> PaneLabel {
        let status = self.state.status();
        let class = StatusClass::from_code(status.code);
        let detail = match (status.phase, status.code, status.signal.as_deref()) {
            (ProcessPhase::Idle, _, _) => "idle".to_owned(),
            (ProcessPhase::Starting, _, _) => "starting".to_owned(),
            (ProcessPhase::Running, _, _) => status
                .pid
                .map(|pid| format!("pid {pid}"))
                .unwrap_or_else(|| "running".to_owned()),
            (ProcessPhase::Exited, Some(code), _) => format!("exit {code}"),
            (ProcessPhase::Exited, None, Some(signal)) => format!("signal {signal}"),
            (ProcessPhase::Exited, None, None) => "exited".to_owned(),
        };
        let style = match class {
            StatusClass::Pending => self.theme.label,
            StatusClass::Success => self.theme.success,
            StatusClass::Failure => self.theme.error,
        };
        PaneLabel {
            title: self.title.clone(),
            status: class,
            detail,
            show_errors: self.state.flag(PaneKey::ShowErrors),
            show_logs: self.state.flag(PaneKey::ShowLogs),
            render_count: self.render_count,
            style,
        }
    }

    fn take_focus_request(&mut self) -> Option<FocusMove> {
        self.focus_request.take()
    }
}

#[cfg(test)]
#[path = "../tests/pane_tests.rs"]
mod tests;
