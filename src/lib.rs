pub mod config;
pub mod layout;
pub mod pane;
pub mod process_manager;
pub mod state;
pub mod testing;
pub mod tui;
pub mod ui;
pub mod watch;

use std::io;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, DashboardConfig};
use crate::tui::{DashboardError, DashboardOutcome};
use crate::ui::{
    KeyValue, OutputMode, PlainRenderer, Renderer, StepState, TableSpec, UiError, UiResult,
};
use crate::watch::WatchPattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Layout(ConfigArgs),
    Check(ConfigArgs),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CliParseError {
    #[error("--config requires a value")]
    MissingConfigValue,
    #[error("--log-file requires a value")]
    MissingLogFileValue,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Failures surfaced by the binary as an error block.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Ui(#[from] UiError),
    #[error("cannot read the working directory: {0}")]
    WorkingDir(io::Error),
}

impl AppError {
    pub fn title(&self) -> &'static str {
        match self {
            AppError::Config(_) => "Invalid config",
            AppError::Dashboard(_) => "Dashboard failed",
            AppError::Ui(_) | AppError::WorkingDir(_) => "Output failed",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::Config(ConfigError::NotFound { .. }) => Some(
                "Create panedeck.json (or panedeck.toml) here, or pass --config <path>",
            ),
            AppError::Config(ConfigError::MissingFrame { .. }) => {
                Some("Every slug in `layout` needs an entry under `frames`")
            }
            AppError::Config(_) => Some("Run `panedeck check` to validate the config"),
            _ => None,
        }
    }
}

pub fn parse_command<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().peekable();
    let Some(first) = args.peek().cloned() else {
        return Ok(Command::Run(RunArgs::default()));
    };

    match first.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "run" => {
            args.next();
            parse_run(args)
        }
        "layout" => {
            args.next();
            parse_config_only(args).map(Command::Layout)
        }
        "check" => {
            args.next();
            parse_config_only(args).map(Command::Check)
        }
        flag if flag.starts_with('-') => parse_run(args),
        other => Err(CliParseError::UnknownCommand(other.to_owned())),
    }
}

fn parse_run<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut run = RunArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let Some(path) = args.next() else {
                    return Err(CliParseError::MissingConfigValue);
                };
                run.config = Some(PathBuf::from(path));
            }
            "--log-file" => {
                let Some(path) = args.next() else {
                    return Err(CliParseError::MissingLogFileValue);
                };
                run.log_file = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(CliParseError::UnknownArgument(other.to_owned())),
        }
    }

    Ok(Command::Run(run))
}

fn parse_config_only<I>(args: I) -> Result<ConfigArgs, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut parsed = ConfigArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let Some(path) = args.next() else {
                    return Err(CliParseError::MissingConfigValue);
                };
                parsed.config = Some(PathBuf::from(path));
            }
            other => return Err(CliParseError::UnknownArgument(other.to_owned())),
        }
    }

    Ok(parsed)
}

/// Loads `--config` relative to `cwd`, or the first known config file in it.
pub fn resolve_config(explicit: Option<&Path>, cwd: &Path) -> Result<DashboardConfig, ConfigError> {
    let path = match explicit {
        Some(path) => cwd.join(path),
        None => DashboardConfig::discover(cwd)?,
    };
    DashboardConfig::load(&path)
}

pub fn run_command(cmd: Command, cwd: &Path) -> Result<Option<DashboardOutcome>, AppError> {
    let mode = OutputMode::from_env();
    match cmd {
        Command::Run(args) => {
            let config = resolve_config(args.config.as_deref(), cwd)?;
            let outcome = tui::run_dashboard(&config, cwd.to_path_buf())?;
            Ok(Some(outcome))
        }
        Command::Layout(args) => {
            let config = resolve_config(args.config.as_deref(), cwd)?;
            run_layout(&mut PlainRenderer::stdout(mode), &config)?;
            Ok(None)
        }
        Command::Check(args) => {
            let config = resolve_config(args.config.as_deref(), cwd)?;
            run_check(&mut PlainRenderer::stdout(mode), &config)?;
            Ok(None)
        }
        Command::Help => {
            print_usage();
            Ok(None)
        }
    }
}

/// Prints every compiled rect in tab order.
pub fn run_layout<R: Renderer>(renderer: &mut R, config: &DashboardConfig) -> UiResult<()> {
    renderer.section(config.title())?;
    let headers = ["pane", "top", "left", "width", "height"]
        .iter()
        .map(|header| (*header).to_owned())
        .collect();
    let rows = config
        .panes
        .iter()
        .map(|plan| {
            vec![
                plan.slug.clone(),
                format!("{:.2}", plan.rect.top),
                format!("{:.2}", plan.rect.left),
                format!("{:.2}", plan.rect.width),
                format!("{:.2}", plan.rect.height),
            ]
        })
        .collect();
    renderer.table(&TableSpec::new(headers, rows))?;
    warn_unplaced(renderer, config)
}

/// Summarises a config that already parsed and compiled; flags what would
/// silently misbehave at runtime.
pub fn run_check<R: Renderer>(renderer: &mut R, config: &DashboardConfig) -> UiResult<()> {
    renderer.section("Config")?;
    let source = config
        .source
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<inline>".to_owned());
    renderer.key_values(&[
        KeyValue::new("source", source),
        KeyValue::new("name", config.title()),
        KeyValue::new("panes", config.panes.len().to_string()),
        KeyValue::new("throttle", format!("{}ms", config.throttle.as_millis())),
    ])?;
    renderer.text("")?;

    renderer.section("Panes")?;
    for plan in &config.panes {
        let mut label = format!("{}: {}", plan.spec.label_or(&plan.slug), plan.spec.command_line());
        let mut state = StepState::Done;
        if let Some(glob) = plan.spec.watch_glob() {
            if WatchPattern::new(glob).is_valid() {
                label.push_str(&format!(" (watch {glob})"));
            } else {
                label.push_str(&format!(" (invalid watch glob `{glob}`)"));
                state = StepState::Failed;
            }
        }
        renderer.step(&label, state)?;
    }
    warn_unplaced(renderer, config)
}

fn warn_unplaced<R: Renderer>(renderer: &mut R, config: &DashboardConfig) -> UiResult<()> {
    if config.unplaced.is_empty() {
        return Ok(());
    }
    renderer.warning(&format!(
        "not placed by the layout: {}",
        config.unplaced.join(", ")
    ))
}

pub fn print_usage() {
    eprintln!(
        "panedeck\n\nUSAGE:\n  panedeck [run] [--config <PATH>] [--log-file <PATH>]\n  panedeck layout [--config <PATH>]\n  panedeck check [--config <PATH>]\n\nCOMMANDS:\n  run               Start the dashboard (default)\n  layout            Print the compiled pane rects\n  check             Validate the config and summarise panes\n\nOPTIONS:\n  -c, --config <PATH>   Config file (default: panedeck.json, panedeck.toml, .panedeckrc)\n  --log-file <PATH>     Write tracing output to PATH (or set PANEDECK_LOG_FILE)\n\nKEYS:\n  tab / shift+tab   Move focus between panes\n  w                 Open the pane menu\n  enter             Respawn the focused pane\n  q e r f           Clear, toggle stderr, toggle log, fullscreen\n  esc               Close the menu or leave fullscreen\n  ctrl+c            Quit\n\nENVIRONMENT:\n  PANEDECK_LOG      Log filter (default: panedeck=info)\n  PANEDECK_COLOR    always | never | auto\n\nGENERAL:\n  -h, --help        Print help\n"
    );
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
