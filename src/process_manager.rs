use std::fmt;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::{setpgid, Pid};
use tracing::{debug, info, trace, warn};

use crate::pane::state::{LogKind, PaneKey, PaneState, PaneValue, ProcessStatus};
use crate::tui::terminal_text::format_elapsed;
use crate::watch::{WatchEvent, WatchPattern};

/// Exit code reported when the OS refuses to start the command.
pub const SPAWN_FAILURE_CODE: i32 = 127;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(40);
const OUTPUT_DRAIN_WAIT: Duration = Duration::from_millis(200);
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Identity of one spawned process within a pane. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessPhase {
    #[default]
    Idle,
    Starting,
    Running,
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub pane: String,
    pub handle: HandleId,
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl SpawnRequest {
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.cmd.clone()
        } else {
            format!("{} {}", self.cmd, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            Self {
                code: status.code(),
                signal: status.signal().map(signal_name),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                code: status.code(),
                signal: None,
            }
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.signal) {
            (Some(code), _) => write!(f, "exit={code}"),
            (None, Some(signal)) => write!(f, "signal={signal}"),
            (None, None) => write!(f, "exit=unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEventKind {
    Stdout(String),
    Stderr(String),
    Exit(ExitInfo),
}

/// Message from a process pump back to the dashboard loop. `handle` lets the
/// receiving supervisor drop events from a process it already replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub pane: String,
    pub handle: HandleId,
    pub kind: ProcessEventKind,
}

pub trait ProcessHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// Terminates the process. Must succeed quietly when it already exited.
    fn kill(&mut self) -> io::Result<()>;
}

/// Process-execution seam. Implementations start the command and report its
/// output and exit through `events`, tagged with `request.handle`.
pub trait Spawner: Send + Sync {
    fn spawn(
        &self,
        request: &SpawnRequest,
        events: Sender<ProcessEvent>,
    ) -> io::Result<Box<dyn ProcessHandle>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespawnReason {
    Initial,
    Manual,
    FileChange(String),
}

impl fmt::Display for RespawnReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespawnReason::Initial => write!(f, "initial start"),
            RespawnReason::Manual => write!(f, "manual"),
            RespawnReason::FileChange(path) => write!(f, "changed: {path}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub handle: HandleId,
    pub pid: Option<u32>,
    pub code: Option<i32>,
    pub signal: Option<String>,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
}

impl ProcessRecord {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        self.ended_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub clear_on_restart: bool,
}

/// Owns the lifecycle of one pane's process: at most one live handle at a
/// time, every transition published into the pane's state.
pub struct ProcessSupervisor {
    pane: String,
    command: CommandSpec,
    watch: Option<WatchPattern>,
    spawner: Arc<dyn Spawner>,
    events: Sender<ProcessEvent>,
    phase: ProcessPhase,
    record: Option<ProcessRecord>,
    handle: Option<Box<dyn ProcessHandle>>,
    next_handle: u64,
    restarts: usize,
    stderr_seen: bool,
}

impl ProcessSupervisor {
    pub fn new(
        pane: impl Into<String>,
        command: CommandSpec,
        watch: Option<WatchPattern>,
        spawner: Arc<dyn Spawner>,
        events: Sender<ProcessEvent>,
    ) -> Self {
        Self {
            pane: pane.into(),
            command,
            watch,
            spawner,
            events,
            phase: ProcessPhase::Idle,
            record: None,
            handle: None,
            next_handle: 1,
            restarts: 0,
            stderr_seen: false,
        }
    }

    pub fn pane(&self) -> &str {
        &self.pane
    }

    pub fn phase(&self) -> ProcessPhase {
        self.phase
    }

    pub fn record(&self) -> Option<&ProcessRecord> {
        self.record.as_ref()
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Kills whatever is running, then starts a fresh process. Spawn failures
    /// are recorded as an exit with `SPAWN_FAILURE_CODE`.
    pub fn respawn(&mut self, state: &mut PaneState, reason: RespawnReason) {
        let replacing = self.record.is_some();
        self.terminate_current();

        if replacing {
            self.restarts += 1;
            info!(pane = %self.pane, %reason, "respawning process");
            state.push_log(LogKind::Log, format!("restarting ({reason})"));
            state.set([(PaneKey::Restarts, PaneValue::Count(self.restarts))]);
        }
        if self.command.clear_on_restart {
            state.clear_log();
        }

        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        self.stderr_seen = false;
        self.phase = ProcessPhase::Starting;
        self.record = Some(ProcessRecord {
            handle,
            pid: None,
            code: None,
            signal: None,
            started_at: Instant::now(),
            ended_at: None,
        });
        self.publish(state);

        let request = SpawnRequest {
            pane: self.pane.clone(),
            handle,
            cmd: self.command.cmd.clone(),
            args: self.command.args.clone(),
            cwd: self.command.cwd.clone(),
        };
        match self.spawner.spawn(&request, self.events.clone()) {
            Ok(process) => {
                let pid = process.pid();
                debug!(pane = %self.pane, %handle, ?pid, command = %request.command_line(), "spawned process");
                if let Some(record) = self.record.as_mut() {
                    record.pid = pid;
                }
                self.handle = Some(process);
                self.phase = ProcessPhase::Running;
                self.publish(state);
            }
            Err(error) => {
                warn!(pane = %self.pane, command = %request.command_line(), %error, "failed to spawn process");
                if let Some(record) = self.record.as_mut() {
                    record.code = Some(SPAWN_FAILURE_CODE);
                    record.ended_at = Some(Instant::now());
                }
                self.phase = ProcessPhase::Exited;
                self.publish(state);
                state.push_log(
                    LogKind::Log,
                    format!(
                        "failed to start `{}`: {error} (exit {SPAWN_FAILURE_CODE})",
                        request.command_line()
                    ),
                );
            }
        }
    }

    /// Applies one pump event. Events for a handle other than the current one
    /// are dropped without touching state.
    pub fn handle_event(&mut self, state: &mut PaneState, event: ProcessEvent) -> EventOutcome {
        let is_current = event.pane == self.pane
            && self
                .record
                .as_ref()
                .is_some_and(|record| record.handle == event.handle && record.is_running());
        if !is_current {
            trace!(pane = %self.pane, handle = %event.handle, "discarding stale process event");
            return EventOutcome::Stale;
        }

        match event.kind {
            ProcessEventKind::Stdout(chunk) => {
                state.push_log(LogKind::Stdout, chunk);
            }
            ProcessEventKind::Stderr(chunk) => {
                if !self.stderr_seen {
                    self.stderr_seen = true;
                    state.push_log(LogKind::Log, "⚠ stderr");
                }
                state.push_log(LogKind::Stderr, chunk);
            }
            ProcessEventKind::Exit(exit) => {
                let elapsed = match self.record.as_mut() {
                    Some(record) => {
                        record.code = exit.code;
                        record.signal = exit.signal.clone();
                        record.ended_at = Some(Instant::now());
                        record.elapsed()
                    }
                    None => Duration::ZERO,
                };
                self.phase = ProcessPhase::Exited;
                debug!(pane = %self.pane, handle = %event.handle, %exit, "process exited");
                self.publish(state);
                state.push_log(
                    LogKind::Log,
                    format!(
                        "exited: code {}, signal {} after {}",
                        exit.code
                            .map(|code| code.to_string())
                            .unwrap_or_else(|| "none".to_owned()),
                        exit.signal.as_deref().unwrap_or("none"),
                        format_elapsed(elapsed)
                    ),
                );
            }
        }
        EventOutcome::Applied
    }

    /// Respawns when `event` touches a path matching this pane's watch glob.
    pub fn handle_file_change(&mut self, state: &mut PaneState, event: &WatchEvent) -> bool {
        let matched = self
            .watch
            .as_ref()
            .is_some_and(|pattern| pattern.matches(&event.path));
        if matched {
            self.respawn(state, RespawnReason::FileChange(event.path.clone()));
        }
        matched
    }

    pub fn shutdown(&mut self) {
        self.terminate_current();
    }

    fn terminate_current(&mut self) {
        if let Some(mut process) = self.handle.take() {
            debug!(pane = %self.pane, pid = ?process.pid(), "terminating process");
            if let Err(error) = process.kill() {
                warn!(pane = %self.pane, %error, "failed to terminate process");
            }
        }
    }

    fn publish(&self, state: &mut PaneState) {
        let status = match self.record.as_ref() {
            Some(record) => ProcessStatus {
                phase: self.phase,
                handle: Some(record.handle),
                pid: record.pid,
                code: record.code,
                signal: record.signal.clone(),
            },
            None => ProcessStatus {
                phase: self.phase,
                ..ProcessStatus::default()
            },
        };
        state.set([(PaneKey::Status, PaneValue::Status(status))]);
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.terminate_current();
    }
}

/// Spawns real OS processes in their own process group.
#[derive(Debug, Clone, Default)]
pub struct OsSpawner;

impl OsSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl Spawner for OsSpawner {
    fn spawn(
        &self,
        request: &SpawnRequest,
        events: Sender<ProcessEvent>,
    ) -> io::Result<Box<dyn ProcessHandle>> {
        let mut child = build_command(request).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::BrokenPipe, "stdout pipe missing"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::BrokenPipe, "stderr pipe missing"))?;
        let pid = child.id();
        let child = Arc::new(Mutex::new(child));

        let (drained_tx, drained_rx) = mpsc::channel::<()>();
        spawn_pump(stdout, request, events.clone(), drained_tx.clone(), ProcessEventKind::Stdout);
        spawn_pump(stderr, request, events.clone(), drained_tx, ProcessEventKind::Stderr);

        {
            let child = Arc::clone(&child);
            let pane = request.pane.clone();
            let handle = request.handle;
            thread::spawn(move || loop {
                let status = lock_child(&child).try_wait();
                let exit = match status {
                    Ok(Some(status)) => ExitInfo::from_status(status),
                    Ok(None) => {
                        thread::sleep(EXIT_POLL_INTERVAL);
                        continue;
                    }
                    Err(error) => {
                        warn!(%pane, %handle, %error, "failed waiting for process");
                        ExitInfo {
                            code: None,
                            signal: None,
                        }
                    }
                };
                // let trailing output land before the exit line
                for _ in 0..2 {
                    let _ = drained_rx.recv_timeout(OUTPUT_DRAIN_WAIT);
                }
                let _ = events.send(ProcessEvent {
                    pane,
                    handle,
                    kind: ProcessEventKind::Exit(exit),
                });
                break;
            });
        }

        Ok(Box::new(OsProcessHandle { pid, child }))
    }
}

struct OsProcessHandle {
    pid: u32,
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle for OsProcessHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn kill(&mut self) -> io::Result<()> {
        let mut child = lock_child(&self.child);
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            signal_process_group(self.pid, Signal::SIGTERM)?;
            drop(child);
            let child = Arc::clone(&self.child);
            let pid = self.pid;
            thread::spawn(move || {
                let deadline = Instant::now() + KILL_GRACE;
                while Instant::now() < deadline {
                    if matches!(lock_child(&child).try_wait(), Ok(Some(_))) {
                        return;
                    }
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
                if matches!(lock_child(&child).try_wait(), Ok(None)) {
                    let _ = signal_process_group(pid, Signal::SIGKILL);
                }
            });
            Ok(())
        }
        #[cfg(not(unix))]
        {
            child.kill()
        }
    }
}

fn spawn_pump<R>(
    stream: R,
    request: &SpawnRequest,
    events: Sender<ProcessEvent>,
    drained: Sender<()>,
    wrap: fn(String) -> ProcessEventKind,
) where
    R: Read + Send + 'static,
{
    let pane = request.pane.clone();
    let handle = request.handle;
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(512);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let chunk = String::from_utf8_lossy(&buf).into_owned();
                    let sent = events.send(ProcessEvent {
                        pane: pane.clone(),
                        handle,
                        kind: wrap(chunk),
                    });
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = drained.send(());
    });
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_command(request: &SpawnRequest) -> ProcessCommand {
    let mut process = ProcessCommand::new(&request.cmd);
    process
        .args(&request.args)
        .current_dir(&request.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    unsafe {
        process.pre_exec(|| {
            setpgid(Pid::from_raw(0), Pid::from_raw(0))
                .map_err(|error| io::Error::new(ErrorKind::Other, error.to_string()))
        });
    }
    with_local_node_bin_path(&mut process, &request.cwd);
    process
}

fn with_local_node_bin_path(process: &mut ProcessCommand, cwd: &Path) {
    let local_bin = cwd.join("node_modules/.bin");
    if !local_bin.is_dir() {
        return;
    }
    let local_rendered = local_bin.display().to_string();
    let merged = match std::env::var("PATH") {
        Ok(path) if !path.is_empty() => format!("{local_rendered}:{path}"),
        _ => local_rendered,
    };
    process.env("PATH", merged);
}

#[cfg(unix)]
fn signal_process_group(pid: u32, signal: Signal) -> io::Result<()> {
    let Ok(pid) = i32::try_from(pid) else {
        return Ok(());
    };
    if pid <= 0 {
        return Ok(());
    }
    match kill(Pid::from_raw(-pid), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(error) => Err(io::Error::from(error)),
    }
}

#[cfg(unix)]
fn signal_name(raw: i32) -> String {
    Signal::try_from(raw)
        .map(|signal| signal.as_str().to_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
#[path = "tests/process_manager_tests.rs"]
mod tests;
