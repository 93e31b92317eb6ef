use std::io::{IsTerminal, Write};
use std::time::Duration;

use anstream::{AutoStream, ColorChoice};
use anstyle::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui::renderer::{
    KeyValue, MessageBlock, Renderer, SpinnerHandle, StepState, TableSpec, UiResult,
};
use crate::ui::table::render_table;
use crate::ui::theme::{is_ci_environment, resolve_color_enabled, OutputMode, Theme};

const SPINNER_TICK: Duration = Duration::from_millis(80);

/// Writes reports to any `Write`. `stdout`/`stderr` wrap the real streams in
/// anstream so escapes are stripped when colour is off.
pub struct PlainRenderer<W: Write> {
    writer: W,
    color_enabled: bool,
    progress_enabled: bool,
    theme: Theme,
}

impl<W: Write> PlainRenderer<W> {
    pub fn new(writer: W, color_enabled: bool) -> Self {
        Self {
            writer,
            color_enabled,
            progress_enabled: false,
            theme: Theme::default(),
        }
    }

    pub fn with_progress_enabled(mut self, enabled: bool) -> Self {
        self.progress_enabled = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn style_text(&self, style: Style, text: &str) -> String {
        if !self.color_enabled {
            return text.to_owned();
        }
        format!("{}{}{}", style.render(), text, style.render_reset())
    }
}

fn color_choice(mode: OutputMode) -> ColorChoice {
    match mode {
        OutputMode::Auto => ColorChoice::Auto,
        OutputMode::Always => ColorChoice::AlwaysAnsi,
        OutputMode::Never => ColorChoice::Never,
    }
}

impl PlainRenderer<AutoStream<std::io::Stdout>> {
    pub fn stdout(mode: OutputMode) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        Self::new(
            AutoStream::new(std::io::stdout(), color_choice(mode)),
            resolve_color_enabled(mode, is_tty),
        )
        .with_progress_enabled(is_tty && !is_ci_environment())
    }
}

impl PlainRenderer<AutoStream<std::io::Stderr>> {
    /// Error reports only; never animates.
    pub fn stderr(mode: OutputMode) -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self::new(
            AutoStream::new(std::io::stderr(), color_choice(mode)),
            resolve_color_enabled(mode, is_tty),
        )
    }
}

impl<W: Write> Renderer for PlainRenderer<W> {
    fn text(&mut self, body: &str) -> UiResult<()> {
        if body.ends_with('\n') {
            write!(self.writer, "{body}")?;
        } else {
            writeln!(self.writer, "{body}")?;
        }
        Ok(())
    }

    fn section(&mut self, title: &str) -> UiResult<()> {
        let rule = "─".repeat(title.chars().count());
        let title = self.style_text(self.theme.accent, title);
        let rule = self.style_text(self.theme.muted, &rule);
        writeln!(self.writer, "{title}\n{rule}")?;
        Ok(())
    }

    fn warning(&mut self, body: &str) -> UiResult<()> {
        let marker = self.style_text(self.theme.warning, "•");
        let label = self.style_text(self.theme.muted, "warn");
        writeln!(self.writer, "{marker} {label}: {body}")?;
        Ok(())
    }

    fn error_block(&mut self, block: &MessageBlock) -> UiResult<()> {
        let marker = self.style_text(self.theme.error, "[error]");
        writeln!(self.writer, "{marker} {}", block.title)?;
        for line in block.body.lines() {
            writeln!(self.writer, "  {line}")?;
        }
        if let Some(hint) = &block.hint {
            let label = self.style_text(self.theme.muted, "hint");
            writeln!(self.writer, "  {label}: {hint}")?;
        }
        Ok(())
    }

    fn key_values(&mut self, items: &[KeyValue]) -> UiResult<()> {
        let width = items
            .iter()
            .map(|item| item.key.chars().count())
            .max()
            .unwrap_or(0);
        for item in items {
            let key = self.style_text(self.theme.label, &format!("{:<width$}", item.key));
            let value = self.style_text(self.theme.value, &item.value);
            writeln!(self.writer, "{key}  {value}")?;
        }
        Ok(())
    }

    fn step(&mut self, label: &str, state: StepState) -> UiResult<()> {
        let (symbol, style) = match state {
            StepState::Done => ("✓", self.theme.success),
            StepState::Failed => ("✕", self.theme.error),
            StepState::Running => ("◌", self.theme.accent),
        };
        let symbol = self.style_text(style, symbol);
        writeln!(self.writer, "{symbol} {label}")?;
        Ok(())
    }

    fn table(&mut self, spec: &TableSpec) -> UiResult<()> {
        writeln!(self.writer, "{}", render_table(spec))?;
        Ok(())
    }

    fn spinner(&mut self, label: &str) -> UiResult<Box<dyn SpinnerHandle>> {
        if !self.progress_enabled {
            self.step(label, StepState::Running)?;
            return Ok(Box::new(Spinner::Silent));
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(label.to_owned());
        bar.enable_steady_tick(SPINNER_TICK);
        Ok(Box::new(Spinner::Live(bar)))
    }
}

/// Progress feedback for a blocking wait. Off a terminal the label is printed
/// once as a running step and finishing is a no-op.
enum Spinner {
    Live(ProgressBar),
    Silent,
}

impl SpinnerHandle for Spinner {
    fn finish_success(&self, message: &str) {
        match self {
            Spinner::Live(bar) if message.is_empty() => bar.finish_and_clear(),
            Spinner::Live(bar) => bar.finish_with_message(message.to_owned()),
            Spinner::Silent => {}
        }
    }

    fn finish_error(&self, message: &str) {
        if let Spinner::Live(bar) = self {
            bar.abandon_with_message(message.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(renderer: PlainRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).expect("utf8")
    }

    #[test]
    fn error_block_prints_body_lines_and_hint_without_color() {
        let mut renderer = PlainRenderer::new(Vec::<u8>::new(), false);
        renderer
            .error_block(
                &MessageBlock::new("Invalid config", "layout group `layout` is empty")
                    .with_hint("Add at least one pane slug to `layout`"),
            )
            .expect("render error block");

        assert_eq!(
            rendered(renderer),
            "[error] Invalid config\n  layout group `layout` is empty\n  hint: Add at least one pane slug to `layout`\n"
        );
    }

    #[test]
    fn key_values_are_aligned_on_longest_key() {
        let mut renderer = PlainRenderer::new(Vec::<u8>::new(), false);
        renderer.section("Process Results").expect("section");
        renderer
            .key_values(&[
                KeyValue::new("api", "exit 0"),
                KeyValue::new("worker", "exit 1"),
            ])
            .expect("key values");

        assert_eq!(
            rendered(renderer),
            "Process Results\n───────────────\napi     exit 0\nworker  exit 1\n"
        );
    }

    #[test]
    fn warning_and_text_lines() {
        let mut renderer = PlainRenderer::new(Vec::<u8>::new(), false);
        renderer.warning("not placed by the layout: spare").expect("warning");
        renderer.text("done\n").expect("text");
        renderer.text("").expect("blank");

        assert_eq!(
            rendered(renderer),
            "• warn: not placed by the layout: spare\ndone\n\n"
        );
    }

    #[test]
    fn spinner_falls_back_to_step_output_when_progress_disabled() {
        let mut renderer = PlainRenderer::new(Vec::<u8>::new(), false);
        let spinner = renderer.spinner("Stopping panes").expect("spinner");
        spinner.finish_error("timed out");
        spinner.finish_success("Done");

        assert_eq!(rendered(renderer), "◌ Stopping panes\n");
    }

    #[test]
    fn colored_output_wraps_text_in_escape_codes() {
        let renderer = PlainRenderer::new(Vec::<u8>::new(), true);
        let styled = renderer.style_text(Theme::default().error, "boom");
        assert!(styled.starts_with('\u{1b}'));
        assert!(styled.contains("boom"));
    }
}
