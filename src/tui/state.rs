use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::DashboardConfig;
use crate::pane::state::ProcessStatus;
use crate::pane::{FocusMove, Pane, PaneContext, Renderable};
use crate::process_manager::{ProcessEvent, ProcessPhase, ProcessRecord, Spawner};
use crate::ui::Theme;
use crate::watch::WatchEvent;

use super::DashboardError;

/// Final state of one pane, reported after the dashboard closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneResult {
    pub slug: String,
    pub title: String,
    pub status: ProcessStatus,
    pub restarts: usize,
    pub elapsed: Option<Duration>,
}

/// Owns every pane. Panes are addressed by index in tab order; the slug map
/// routes process events back to their pane.
pub struct Dashboard {
    title: String,
    theme: Theme,
    panes: Vec<Pane>,
    index: HashMap<String, usize>,
    focus: usize,
    events: Receiver<ProcessEvent>,
    dirty: bool,
}

impl Dashboard {
    /// Builds one pane per layout slot; each pane starts its process.
    pub fn new(
        config: &DashboardConfig,
        spawner: Arc<dyn Spawner>,
        cwd: PathBuf,
        theme: Theme,
    ) -> Result<Self, DashboardError> {
        if config.panes.is_empty() {
            return Err(DashboardError::NoPanes);
        }
        let (tx, rx) = mpsc::channel();
        let context = PaneContext {
            spawner,
            events: tx,
            cwd,
            theme,
            window: config.throttle,
        };
        let panes = config
            .panes
            .iter()
            .map(|plan| Pane::new(plan.slug.clone(), &plan.spec, plan.rect.clone(), &context))
            .collect::<Vec<Pane>>();
        let index = panes
            .iter()
            .enumerate()
            .map(|(idx, pane)| (pane.slug().to_owned(), idx))
            .collect();
        Ok(Self {
            title: config.title().to_owned(),
            theme,
            panes,
            index,
            focus: 0,
            events: rx,
            dirty: true,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn pane(&self, slug: &str) -> Option<&Pane> {
        self.index.get(slug).map(|idx| &self.panes[*idx])
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn focused(&self) -> &Pane {
        &self.panes[self.focus]
    }

    pub fn focused_mut(&mut self) -> &mut Pane {
        &mut self.panes[self.focus]
    }

    pub fn full_screen_index(&self) -> Option<usize> {
        self.panes.iter().position(Pane::is_full_screen)
    }

    pub fn move_focus(&mut self, direction: FocusMove) {
        if self.full_screen_index().is_some() {
            return;
        }
        let len = self.panes.len();
        self.focus = match direction {
            FocusMove::Next => (self.focus + 1) % len,
            FocusMove::Previous => (self.focus + len - 1) % len,
        };
        self.dirty = true;
    }

    /// Forwards pending focus requests from the focused pane.
    pub fn apply_focus_requests(&mut self) {
        if let Some(direction) = self.focused_mut().take_focus_request() {
            self.move_focus(direction);
        }
    }

    /// Applies up to `max` queued process events without blocking.
    pub fn drain_process_events(&mut self, max: usize) -> usize {
        let mut drained = 0usize;
        while drained < max {
            let Ok(event) = self.events.try_recv() else {
                break;
            };
            drained += 1;
            self.route_event(event);
        }
        drained
    }

    /// Blocks until every pane's process has exited or `timeout` passes.
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.all_exited() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.events.recv_timeout(deadline - now) {
                Ok(event) => self.route_event(event),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        true
    }

    /// Hands a file change to every pane; each decides against its own glob.
    pub fn dispatch_watch_event(&mut self, event: &WatchEvent) -> usize {
        let respawned = self
            .panes
            .iter_mut()
            .map(|pane| pane.handle_file_change(event))
            .filter(|matched| *matched)
            .count();
        debug!(path = %event.path, kind = event.kind.label(), respawned, "file change");
        respawned
    }

    /// Releases due coalesced changes. Returns true when anything needs drawing.
    pub fn poll_renders(&mut self, now: Instant) -> bool {
        let mut any = false;
        for pane in &mut self.panes {
            any |= pane.poll_render(now);
        }
        self.dirty |= any;
        any
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn shutdown(&mut self) {
        for pane in &mut self.panes {
            pane.shutdown();
        }
    }

    pub fn results(&self) -> Vec<PaneResult> {
        self.panes
            .iter()
            .map(|pane| PaneResult {
                slug: pane.slug().to_owned(),
                title: pane.label().title,
                status: pane.status(),
                restarts: pane.restarts(),
                elapsed: pane.supervisor().record().map(ProcessRecord::elapsed),
            })
            .collect()
    }

    fn all_exited(&self) -> bool {
        self.panes
            .iter()
            .all(|pane| matches!(pane.status().phase, ProcessPhase::Exited | ProcessPhase::Idle))
    }

    fn route_event(&mut self, event: ProcessEvent) {
        match self.index.get(&event.pane) {
            Some(idx) => {
                self.panes[*idx].handle_process_event(event);
            }
            None => trace!(pane = %event.pane, "event for unknown pane"),
        }
    }
}
