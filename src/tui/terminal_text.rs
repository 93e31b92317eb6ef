use std::time::Duration;

use anstyle::{AnsiColor, Effects};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Splits pane text into display lines and keeps the last `height` of them.
/// A carriage return inside a line keeps only what was written after it, the
/// way a terminal would show a progress bar.
pub fn tail_lines(text: &str, height: usize, base: Style) -> Vec<Line<'static>> {
    if height == 0 {
        return Vec::new();
    }
    let lines = text
        .lines()
        .map(|line| {
            let visible = line
                .rsplit('\r')
                .find(|fragment| !fragment.is_empty())
                .unwrap_or("");
            sanitize_log_text(visible)
        })
        .collect::<Vec<String>>();
    let skip = lines.len().saturating_sub(height);
    lines
        .iter()
        .skip(skip)
        .map(|line| ansi_line(line, base))
        .collect()
}

pub fn sanitize_log_text(raw: &str) -> String {
    raw.chars()
        .map(|ch| if ch == '\t' { ' ' } else { ch })
        .filter(|ch| {
            !matches!(
                ch,
                '\r'
                    | '\u{0000}'..='\u{0008}'
                    | '\u{000B}'
                    | '\u{000C}'
                    | '\u{000E}'..='\u{001A}'
                    | '\u{001C}'..='\u{001F}'
                    | '\u{007F}'
            )
        })
        .collect()
}

/// Turns SGR escape sequences into ratatui spans and drops every other
/// escape sequence.
pub fn ansi_line(raw: &str, base: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut style = base;
    let mut buf = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            if !buf.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut buf), style));
            }
            let mut code = String::new();
            for next in chars.by_ref() {
                if ('@'..='~').contains(&next) {
                    if next == 'm' {
                        style = apply_sgr(style, &code, base);
                    }
                    break;
                }
                code.push(next);
            }
        } else {
            buf.push(ch);
        }
    }
    if !buf.is_empty() {
        spans.push(Span::styled(buf, style));
    }
    Line::from(spans)
}

fn apply_sgr(current: Style, sgr: &str, base: Style) -> Style {
    let mut style = current;
    let parts = if sgr.is_empty() {
        vec!["0"]
    } else {
        sgr.split(';').collect::<Vec<&str>>()
    };
    for part in parts {
        let Ok(code) = part.parse::<u8>() else {
            continue;
        };
        style = match code {
            0 => base,
            1 => style.add_modifier(Modifier::BOLD),
            2 => style.add_modifier(Modifier::DIM),
            3 => style.add_modifier(Modifier::ITALIC),
            4 => style.add_modifier(Modifier::UNDERLINED),
            22 => style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            23 => style.remove_modifier(Modifier::ITALIC),
            24 => style.remove_modifier(Modifier::UNDERLINED),
            30..=37 => style.fg(basic_color(code - 30, false)),
            39 => style.fg(base.fg.unwrap_or(Color::Reset)),
            90..=97 => style.fg(basic_color(code - 90, true)),
            _ => style,
        };
    }
    style
}

fn basic_color(index: u8, bright: bool) -> Color {
    match (index, bright) {
        (0, false) => Color::Black,
        (1, false) => Color::Red,
        (2, false) => Color::Green,
        (3, false) => Color::Yellow,
        (4, false) => Color::Blue,
        (5, false) => Color::Magenta,
        (6, false) => Color::Cyan,
        (7, false) => Color::Gray,
        (0, true) => Color::DarkGray,
        (1, true) => Color::LightRed,
        (2, true) => Color::LightGreen,
        (3, true) => Color::LightYellow,
        (4, true) => Color::LightBlue,
        (5, true) => Color::LightMagenta,
        (6, true) => Color::LightCyan,
        _ => Color::White,
    }
}

/// Maps a theme style onto the ratatui equivalent. Only ANSI colours are used
/// by the theme; other colour kinds fall back to the terminal default.
pub fn ratatui_style(style: anstyle::Style) -> Style {
    let mut out = Style::default();
    if let Some(anstyle::Color::Ansi(color)) = style.get_fg_color() {
        out = out.fg(ansi_color(color));
    }
    let effects = style.get_effects();
    if effects.contains(Effects::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if effects.contains(Effects::DIMMED) {
        out = out.add_modifier(Modifier::DIM);
    }
    if effects.contains(Effects::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

fn ansi_color(color: AnsiColor) -> Color {
    match color {
        AnsiColor::Black => Color::Black,
        AnsiColor::Red => Color::Red,
        AnsiColor::Green => Color::Green,
        AnsiColor::Yellow => Color::Yellow,
        AnsiColor::Blue => Color::Blue,
        AnsiColor::Magenta => Color::Magenta,
        AnsiColor::Cyan => Color::Cyan,
        AnsiColor::White => Color::Gray,
        AnsiColor::BrightBlack => Color::DarkGray,
        AnsiColor::BrightRed => Color::LightRed,
        AnsiColor::BrightGreen => Color::LightGreen,
        AnsiColor::BrightYellow => Color::LightYellow,
        AnsiColor::BrightBlue => Color::LightBlue,
        AnsiColor::BrightMagenta => Color::LightMagenta,
        AnsiColor::BrightCyan => Color::LightCyan,
        AnsiColor::BrightWhite => Color::White,
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m{secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs:02}s")
    } else if seconds > 0 {
        format!("{secs}s")
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line<'_>) -> String {
        line.spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect::<String>()
    }

    #[test]
    fn ansi_line_splits_on_colour_changes() {
        let line = ansi_line("\u{1b}[31merror\u{1b}[0m ok", Style::default());
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content.as_ref(), "error");
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
        assert_eq!(line.spans[1].content.as_ref(), " ok");
        assert_eq!(line.spans[1].style, Style::default());
    }

    #[test]
    fn ansi_line_drops_cursor_sequences() {
        let line = ansi_line(
            "\u{1b}[2K\u{1b}[1Ahello \u{1b}[92mgreen\u{1b}[0m",
            Style::default(),
        );
        assert_eq!(plain(&line), "hello green");
        assert_eq!(line.spans[1].style.fg, Some(Color::LightGreen));
    }

    #[test]
    fn sanitize_removes_control_bytes_but_keeps_escape() {
        let raw = "a\u{0008}b\r\u{001b}[31merr\u{001b}[0m\tx";
        assert_eq!(sanitize_log_text(raw), "ab\u{001b}[31merr\u{001b}[0m x");
    }

    #[test]
    fn tail_lines_keeps_last_rows_and_resolves_carriage_returns() {
        let text = "one\ntwo\nbuilding 10%\rbuilding 90%\rdone\nfour\n";
        let lines = tail_lines(text, 3, Style::default());
        let rendered = lines.iter().map(plain).collect::<Vec<String>>();
        assert_eq!(rendered, vec!["two", "done", "four"]);
        assert!(tail_lines(text, 0, Style::default()).is_empty());
    }

    #[test]
    fn theme_styles_map_to_ratatui() {
        let theme = crate::ui::Theme::default();
        let error = ratatui_style(theme.error);
        assert_eq!(error.fg, Some(Color::Red));
        assert!(error.add_modifier.contains(Modifier::BOLD));
        assert_eq!(ratatui_style(theme.muted).fg, Some(Color::DarkGray));
    }

    #[test]
    fn format_elapsed_uses_compact_human_time() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_secs(9)), "9s");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "1m05s");
        assert_eq!(format_elapsed(Duration::from_secs(3665)), "1h01m05s");
    }
}
