mod config;
mod events;
mod lifecycle;
mod render;
pub mod state;
pub mod terminal_text;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use crossterm::event::{self, Event};
use tracing::{debug, info};

use crate::config::DashboardConfig;
use crate::process_manager::OsSpawner;
use crate::ui::{Theme, UiError};
use crate::watch::{FileWatcher, WatchEvent, DEFAULT_POLL_INTERVAL};

use self::config::{INPUT_POLL_WAIT, MAX_EVENTS_PER_TICK};
use self::events::{handle_key_event, LoopControl};
use self::lifecycle::{init_terminal, restore_terminal, shutdown_and_render_summary, TuiTerminal};
use self::render::render_dashboard;

pub use self::state::{Dashboard, PaneResult};

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Ui(#[from] UiError),
    #[error("dashboard has no panes to show")]
    NoPanes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOutcome {
    pub results: Vec<PaneResult>,
}

impl DashboardOutcome {
    /// Panes whose last process ended with a non-zero code.
    pub fn failed(&self) -> Vec<&PaneResult> {
        self.results
            .iter()
            .filter(|result| matches!(result.status.code, Some(code) if code != 0))
            .collect()
    }
}

/// Starts every pane's process, runs the interactive loop until Ctrl-C and
/// prints a summary after the terminal is restored.
pub fn run_dashboard(config: &DashboardConfig, cwd: PathBuf) -> Result<DashboardOutcome, DashboardError> {
    let theme = Theme::default();
    let watches = config
        .panes
        .iter()
        .any(|plan| plan.spec.watch_glob().is_some())
        .then(|| FileWatcher::spawn(cwd.clone(), DEFAULT_POLL_INTERVAL));
    let mut dashboard = Dashboard::new(config, Arc::new(OsSpawner::new()), cwd, theme)?;
    info!(
        title = dashboard.title(),
        panes = dashboard.panes().len(),
        watching = watches.is_some(),
        "dashboard started"
    );

    let mut terminal = init_terminal()?;
    let result = run_loop(&mut terminal, &mut dashboard, watches.as_ref());
    let restored = restore_terminal(&mut terminal);
    let results = shutdown_and_render_summary(&mut dashboard)?;
    result?;
    restored?;
    info!("dashboard stopped");
    Ok(DashboardOutcome { results })
}

fn run_loop(
    terminal: &mut TuiTerminal,
    dashboard: &mut Dashboard,
    watches: Option<&Receiver<WatchEvent>>,
) -> Result<(), DashboardError> {
    loop {
        dashboard.drain_process_events(MAX_EVENTS_PER_TICK);
        if let Some(watches) = watches {
            while let Ok(change) = watches.try_recv() {
                dashboard.dispatch_watch_event(&change);
            }
        }
        dashboard.poll_renders(Instant::now());

        if dashboard.take_dirty() {
            let view = &*dashboard;
            terminal.draw(|frame| render_dashboard(frame, view))?;
        }

        if event::poll(INPUT_POLL_WAIT)? {
            match event::read()? {
                Event::Key(key) => {
                    if handle_key_event(dashboard, key) == LoopControl::Quit {
                        debug!("quit requested");
                        return Ok(());
                    }
                }
                Event::Resize(_, _) => dashboard.mark_dirty(),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/dashboard_tests.rs"]
mod tests;
