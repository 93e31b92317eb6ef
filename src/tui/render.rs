use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use super::state::Dashboard;

mod footer;
mod menu;
mod panes;

use footer::render_footer;
use menu::render_menu;
use panes::render_pane;

/// Draws the body from each pane's percentage rect, or only the fullscreen
/// pane when one is maximised, then the footer line.
pub(super) fn render_dashboard(frame: &mut Frame<'_>, dashboard: &Dashboard) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());
    let body = chunks[0];
    let theme = dashboard.theme();

    match dashboard.full_screen_index() {
        Some(idx) => {
            let pane = &dashboard.panes()[idx];
            render_pane(frame, body, pane, true, theme);
            if pane.is_menu_visible() {
                render_menu(frame, body, pane, theme);
            }
        }
        None => {
            for (idx, pane) in dashboard.panes().iter().enumerate() {
                let area = pane.effective_rect().to_cells(body);
                if area.width < 2 || area.height < 2 {
                    continue;
                }
                render_pane(frame, area, pane, idx == dashboard.focus(), theme);
            }
            // Overlay last so neighbouring panes never paint over it.
            let focused = dashboard.focused();
            if focused.is_menu_visible() {
                render_menu(frame, focused.effective_rect().to_cells(body), focused, theme);
            }
        }
    }

    render_footer(frame, chunks[1], dashboard);
}
