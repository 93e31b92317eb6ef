use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use panedeck::ui::{MessageBlock, OutputMode, PlainRenderer, Renderer};
use panedeck::{parse_command, print_usage, run_command, AppError, Command};
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "PANEDECK_LOG";
const LOG_FILE_ENV: &str = "PANEDECK_LOG_FILE";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let output_mode = OutputMode::from_env();
    let cmd = match parse_command(args) {
        Ok(cmd) => cmd,
        Err(err) => {
            let mut renderer = PlainRenderer::stderr(output_mode);
            let _ = renderer.error_block(
                &MessageBlock::new("Invalid command arguments", err.to_string())
                    .with_hint("Run `panedeck --help` to see supported command forms"),
            );
            print_usage();
            std::process::exit(2);
        }
    };

    let log_file = match &cmd {
        Command::Run(args) => args.log_file.clone(),
        _ => None,
    }
    .or_else(|| std::env::var_os(LOG_FILE_ENV).map(PathBuf::from));
    if let Some(path) = log_file {
        init_logging(&path);
    }

    let result = std::env::current_dir()
        .map_err(AppError::WorkingDir)
        .and_then(|cwd| run_command(cmd, &cwd));
    if let Err(err) = result {
        let mut renderer = PlainRenderer::stderr(output_mode);
        let mut block = MessageBlock::new(err.title(), err.to_string());
        if let Some(hint) = err.hint() {
            block = block.with_hint(hint);
        }
        let _ = renderer.error_block(&block);
        std::process::exit(1);
    }
}

/// The dashboard owns the terminal, so tracing output only ever goes to a file.
fn init_logging(path: &Path) {
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("cannot open log file {}: {err}", path.display());
            return;
        }
    };
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new("panedeck=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}
