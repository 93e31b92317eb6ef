use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::super::state::Dashboard;
use super::super::terminal_text::ratatui_style;

pub(super) fn render_footer(frame: &mut Frame<'_>, area: ratatui::layout::Rect, dashboard: &Dashboard) {
    let muted = Style::default().fg(Color::DarkGray);
    let accent = ratatui_style(dashboard.theme().accent).add_modifier(Modifier::BOLD);
    let focused = dashboard.focused();
    let hints = if focused.is_menu_visible() {
        "↑/↓ select  enter run  w/esc close"
    } else if focused.is_full_screen() {
        "esc restore  w menu  enter respawn  ctrl+c quit"
    } else {
        "tab focus  w menu  enter respawn  f fullscreen  ctrl+c quit"
    };
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(dashboard.title().to_owned(), accent),
        Span::styled("  |  ", muted),
        Span::styled(focused.title().to_owned(), Style::default().fg(Color::Gray)),
        Span::styled("  |  ", muted),
        Span::styled(hints, muted),
    ]));
    frame.render_widget(footer, area);
}
