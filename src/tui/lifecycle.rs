use std::io;

use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::warn;

use crate::ui::{KeyValue, OutputMode, PlainRenderer, Renderer, UiResult};

use super::config::SHUTDOWN_GRACE_TIMEOUT;
use super::state::{Dashboard, PaneResult};
use super::terminal_text::format_elapsed;
use super::DashboardError;

pub(super) type TuiTerminal = Terminal<CrosstermBackend<std::io::Stdout>>;

/// Signals a dashboard shutdown delivers on purpose; exits caused by them
/// are not failures.
const SHUTDOWN_SIGNALS: &[&str] = &["SIGTERM", "SIGKILL", "SIGINT"];

pub(super) fn init_terminal() -> Result<TuiTerminal, io::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;
    terminal.clear()?;
    Ok(terminal)
}

pub(super) fn restore_terminal(terminal: &mut TuiTerminal) -> Result<(), io::Error> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, EnableLineWrap)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Stops every pane, waits out the grace period and prints one line per pane.
/// Expects the terminal to be restored already.
pub(super) fn shutdown_and_render_summary(
    dashboard: &mut Dashboard,
) -> Result<Vec<PaneResult>, DashboardError> {
    let mut renderer = PlainRenderer::stdout(OutputMode::from_env());
    let spinner = renderer.spinner("Stopping panes")?;
    dashboard.shutdown();
    if dashboard.wait_for_exit(SHUTDOWN_GRACE_TIMEOUT) {
        spinner.finish_success("");
    } else {
        warn!(
            grace_ms = SHUTDOWN_GRACE_TIMEOUT.as_millis() as u64,
            "panes still running after shutdown grace period"
        );
        spinner.finish_error("Some panes did not stop in time");
    }

    let results = dashboard.results();
    render_summary(&mut renderer, &results)?;
    Ok(results)
}

pub(super) fn render_summary<R: Renderer>(renderer: &mut R, results: &[PaneResult]) -> UiResult<()> {
    renderer.section("Process Results")?;
    let rows = results
        .iter()
        .map(|result| KeyValue::new(result.slug.clone(), summary_value(result)))
        .collect::<Vec<KeyValue>>();
    renderer.key_values(&rows)?;
    renderer.text("")
}

fn summary_value(result: &PaneResult) -> String {
    let status = &result.status;
    let outcome = match (status.code, status.signal.as_deref()) {
        (Some(0), _) => "OK".to_owned(),
        (None, Some(signal)) if SHUTDOWN_SIGNALS.contains(&signal) => "OK".to_owned(),
        (Some(code), _) => format!("exit={code}"),
        (None, Some(signal)) => format!("signal={signal}"),
        (None, None) => "running".to_owned(),
    };
    let elapsed = result
        .elapsed
        .map(format_elapsed)
        .unwrap_or_else(|| "0ms".to_owned());
    match result.restarts {
        0 => format!("{outcome} {elapsed}"),
        1 => format!("{outcome} {elapsed} (1 restart)"),
        n => format!("{outcome} {elapsed} ({n} restarts)"),
    }
}
