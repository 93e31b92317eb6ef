use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::trace;

use super::state::Dashboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LoopControl {
    Continue,
    Quit,
}

/// Ctrl-C quits; every other key press belongs to the focused pane.
pub(super) fn handle_key_event(dashboard: &mut Dashboard, key: KeyEvent) -> LoopControl {
    if key.kind != KeyEventKind::Press {
        return LoopControl::Continue;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return LoopControl::Quit;
    }
    let handled = dashboard.focused_mut().handle_key(&key);
    if !handled {
        trace!(code = ?key.code, pane = dashboard.focused().slug(), "unhandled key");
    }
    dashboard.apply_focus_requests();
    LoopControl::Continue
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use crossterm::event::KeyEventState;

    use super::*;
    use crate::config::{DashboardConfig, PaneSpec, PanePlan};
    use crate::layout::Rect;
    use crate::testing::FakeSpawner;
    use crate::ui::Theme;

    fn dashboard() -> Dashboard {
        let config = DashboardConfig {
            name: None,
            throttle: Duration::ZERO,
            panes: vec![
                PanePlan {
                    slug: "api".to_owned(),
                    rect: Rect::full("api"),
                    spec: PaneSpec::new("api-server"),
                },
                PanePlan {
                    slug: "ui".to_owned(),
                    rect: Rect::full("ui"),
                    spec: PaneSpec::new("ui-server"),
                },
            ],
            unplaced: Vec::new(),
            source: None,
        };
        Dashboard::new(
            &config,
            Arc::new(FakeSpawner::new()),
            PathBuf::from("."),
            Theme::default(),
        )
        .expect("dashboard")
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn ctrl_c_quits() {
        let mut dashboard = dashboard();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(&mut dashboard, key), LoopControl::Quit);
    }

    #[test]
    fn tab_moves_focus_through_the_focused_pane() {
        let mut dashboard = dashboard();
        assert_eq!(
            handle_key_event(&mut dashboard, press(KeyCode::Tab)),
            LoopControl::Continue
        );
        assert_eq!(dashboard.focused().slug(), "ui");
        handle_key_event(&mut dashboard, press(KeyCode::BackTab));
        assert_eq!(dashboard.focused().slug(), "api");
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut dashboard = dashboard();
        let release = KeyEvent {
            code: KeyCode::Tab,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        handle_key_event(&mut dashboard, release);
        assert_eq!(dashboard.focus(), 0);
    }
}
