use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::border;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::pane::{Pane, Renderable};
use crate::ui::Theme;

use super::super::terminal_text::{ratatui_style, tail_lines};

pub(super) fn render_pane(frame: &mut Frame<'_>, area: Rect, pane: &Pane, focused: bool, theme: &Theme) {
    let label = pane.label();
    let border_style = if focused {
        ratatui_style(theme.focus)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(border_style)
        .title_top(
            Line::from(Span::styled(label.to_string(), ratatui_style(label.style))).left_aligned(),
        );
    let height = area.height.saturating_sub(2) as usize;
    let lines = tail_lines(pane.visible_text(), height, Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
