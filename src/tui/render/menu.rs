use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::border;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::pane::Pane;
use crate::ui::Theme;

use super::super::config::MENU_WIDTH;
use super::super::terminal_text::ratatui_style;

/// Action menu anchored to the pane's top-left corner, inside its border.
pub(super) fn render_menu(frame: &mut Frame<'_>, pane_area: Rect, pane: &Pane, theme: &Theme) {
    let items = pane.menu_items();
    let area = menu_area(pane_area, items.len() as u16);
    if area.width < 4 || area.height < 3 {
        return;
    }
    let selected = pane.menu_selection();
    let accent = ratatui_style(theme.focus);
    let rows = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let active = idx == selected;
            let marker = if active { "› " } else { "  " };
            let style = if active {
                accent.add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(format!("{marker}{}", item.label), style),
                Span::styled(format!(" ({})", item.key), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect::<Vec<Line>>();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(accent)
        .title_top(Line::from(Span::styled(" Menu ", accent)).left_aligned());
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(rows).block(block), area);
}

fn menu_area(pane_area: Rect, rows: u16) -> Rect {
    let x = pane_area.x.saturating_add(1);
    let y = pane_area.y.saturating_add(1);
    Rect {
        x,
        y,
        width: MENU_WIDTH.min(pane_area.width.saturating_sub(2)),
        height: rows.saturating_add(2).min(pane_area.height.saturating_sub(2)),
    }
}
