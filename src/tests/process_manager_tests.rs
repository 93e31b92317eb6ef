use super::*;
use crate::pane::state::{LogKind, PaneKey, PaneState};
use crate::testing::{FakeSpawner, SpawnerCall};
use crate::watch::{WatchEvent, WatchEventKind, WatchPattern};
use std::sync::mpsc::{self, Receiver};

fn command(cmd: &str) -> CommandSpec {
    CommandSpec {
        cmd: cmd.to_owned(),
        args: vec!["--flag".to_owned()],
        cwd: PathBuf::from("."),
        clear_on_restart: false,
    }
}

fn supervisor(
    spawner: &FakeSpawner,
    command: CommandSpec,
    glob: Option<&str>,
) -> (ProcessSupervisor, Receiver<ProcessEvent>) {
    let (tx, rx) = mpsc::channel();
    let supervisor = ProcessSupervisor::new(
        "web",
        command,
        glob.map(WatchPattern::new),
        Arc::new(spawner.clone()),
        tx,
    );
    (supervisor, rx)
}

fn changed(path: &str) -> WatchEvent {
    WatchEvent {
        kind: WatchEventKind::Changed,
        path: path.to_owned(),
    }
}

fn log_lines(state: &PaneState, kind: LogKind) -> Vec<String> {
    state
        .log()
        .iter()
        .filter(|entry| entry.kind == kind)
        .map(|entry| entry.content.to_string())
        .collect()
}

#[test]
fn initial_respawn_runs_command_and_publishes_running_status() {
    let spawner = FakeSpawner::new();
    let (mut sup, _rx) = supervisor(&spawner, command("serve"), None);
    let mut state = PaneState::new([]);

    sup.respawn(&mut state, RespawnReason::Initial);

    let status = state.status();
    assert_eq!(status.phase, ProcessPhase::Running);
    assert_eq!(status.handle, Some(HandleId(1)));
    assert_eq!(status.pid, Some(10_001));
    assert_eq!(status.code, None);
    assert_eq!(sup.restarts(), 0);

    let requests = spawner.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command_line(), "serve --flag");
}

#[test]
fn two_quick_respawns_leave_one_live_process_killed_before_next_spawn() {
    let spawner = FakeSpawner::new();
    let (mut sup, _rx) = supervisor(&spawner, command("serve"), None);
    let mut state = PaneState::new([]);

    sup.respawn(&mut state, RespawnReason::Initial);
    sup.respawn(&mut state, RespawnReason::Manual);
    sup.respawn(&mut state, RespawnReason::Manual);

    assert_eq!(spawner.live_handles("web"), vec![HandleId(3)]);
    let calls = spawner.calls();
    let kill_first = calls
        .iter()
        .position(|call| matches!(call, SpawnerCall::Kill { handle, .. } if *handle == HandleId(1)))
        .expect("first handle killed");
    let spawn_second = calls
        .iter()
        .position(|call| matches!(call, SpawnerCall::Spawn { handle, .. } if *handle == HandleId(2)))
        .expect("second handle spawned");
    assert!(kill_first < spawn_second);
    assert_eq!(sup.restarts(), 2);
    assert_eq!(state.count(PaneKey::Restarts), 2);
    assert_eq!(
        log_lines(&state, LogKind::Log),
        vec!["restarting (manual)", "restarting (manual)"]
    );
}

#[test]
fn stale_exit_does_not_touch_current_status() {
    let spawner = FakeSpawner::new();
    let (mut sup, rx) = supervisor(&spawner, command("serve"), None);
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);
    sup.respawn(&mut state, RespawnReason::Manual);

    assert!(spawner.emit_exit("web", HandleId(1), Some(143)));
    let event = rx.try_recv().expect("stale exit delivered");
    let before = state.snapshot();

    assert_eq!(sup.handle_event(&mut state, event), EventOutcome::Stale);

    let status = state.status();
    assert_eq!(status.phase, ProcessPhase::Running);
    assert_eq!(status.code, None);
    assert_eq!(status.signal, None);
    assert!(Arc::ptr_eq(&before, &state.snapshot()));
}

#[test]
fn exit_records_code_once_and_logs_summary() {
    let spawner = FakeSpawner::new();
    let (mut sup, rx) = supervisor(&spawner, command("build"), None);
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);

    spawner.emit_exit("web", HandleId(1), Some(2));
    spawner.emit_exit("web", HandleId(1), Some(0));
    let first = rx.try_recv().expect("first exit");
    let second = rx.try_recv().expect("duplicate exit");

    assert_eq!(sup.handle_event(&mut state, first), EventOutcome::Applied);
    assert_eq!(sup.handle_event(&mut state, second), EventOutcome::Stale);

    let status = state.status();
    assert_eq!(status.phase, ProcessPhase::Exited);
    assert_eq!(status.code, Some(2));
    assert!(sup.record().and_then(|record| record.ended_at).is_some());
    let logs = log_lines(&state, LogKind::Log);
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("exited: code 2, signal none after "));
}

#[test]
fn output_is_tagged_and_first_stderr_gets_header() {
    let spawner = FakeSpawner::new();
    let (mut sup, rx) = supervisor(&spawner, command("serve"), None);
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);

    spawner.emit_stdout("web", HandleId(1), "listening\n");
    spawner.emit_stderr("web", HandleId(1), "warn a\n");
    spawner.emit_stderr("web", HandleId(1), "warn b\n");
    while let Ok(event) = rx.try_recv() {
        sup.handle_event(&mut state, event);
    }

    let entries = state
        .log()
        .iter()
        .map(|entry| (entry.kind, entry.content.to_string()))
        .collect::<Vec<_>>();
    assert_eq!(
        entries,
        vec![
            (LogKind::Stdout, "listening\n".to_owned()),
            (LogKind::Log, "⚠ stderr".to_owned()),
            (LogKind::Stderr, "warn a\n".to_owned()),
            (LogKind::Stderr, "warn b\n".to_owned()),
        ]
    );
}

#[test]
fn spawn_failure_becomes_exit_with_synthetic_code() {
    let spawner = FakeSpawner::new();
    spawner.fail_command("nope");
    let (mut sup, _rx) = supervisor(&spawner, command("nope"), None);
    let mut state = PaneState::new([]);

    sup.respawn(&mut state, RespawnReason::Initial);

    let status = state.status();
    assert_eq!(status.phase, ProcessPhase::Exited);
    assert_eq!(status.code, Some(SPAWN_FAILURE_CODE));
    let logs = log_lines(&state, LogKind::Log);
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("failed to start `nope --flag`"));
}

#[test]
fn js_glob_ignores_css_and_respawns_once_for_js() {
    let spawner = FakeSpawner::new();
    let (mut sup, _rx) = supervisor(&spawner, command("serve"), Some("*.js"));
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);

    assert!(!sup.handle_file_change(&mut state, &changed("index.css")));
    assert_eq!(spawner.spawn_count("web"), 1);

    assert!(sup.handle_file_change(&mut state, &changed("app.js")));
    assert_eq!(spawner.spawn_count("web"), 2);
    assert_eq!(
        spawner.calls()[1],
        SpawnerCall::Kill {
            pane: "web".to_owned(),
            handle: HandleId(1)
        }
    );
    assert_eq!(
        log_lines(&state, LogKind::Log),
        vec!["restarting (changed: app.js)"]
    );
}

#[test]
fn pane_without_glob_ignores_file_changes() {
    let spawner = FakeSpawner::new();
    let (mut sup, _rx) = supervisor(&spawner, command("serve"), None);
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);

    assert!(!sup.handle_file_change(&mut state, &changed("src/app.js")));
    assert_eq!(spawner.spawn_count("web"), 1);
}

#[test]
fn clear_on_restart_empties_buffer_before_new_process() {
    let spawner = FakeSpawner::new();
    let mut spec = command("serve");
    spec.clear_on_restart = true;
    let (mut sup, rx) = supervisor(&spawner, spec, None);
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);
    spawner.emit_stdout("web", HandleId(1), "old output\n");
    let event = rx.try_recv().expect("stdout");
    sup.handle_event(&mut state, event);
    assert_eq!(state.log().len(), 1);

    sup.respawn(&mut state, RespawnReason::Manual);

    assert!(state.log().is_empty());
    assert_eq!(state.status().handle, Some(HandleId(2)));
}

#[test]
fn shutdown_and_drop_kill_the_current_process() {
    let spawner = FakeSpawner::new();
    let (mut sup, _rx) = supervisor(&spawner, command("serve"), None);
    let mut state = PaneState::new([]);
    sup.respawn(&mut state, RespawnReason::Initial);

    sup.shutdown();
    assert!(spawner.live_handles("web").is_empty());

    sup.respawn(&mut state, RespawnReason::Manual);
    assert_eq!(spawner.live_handles("web"), vec![HandleId(2)]);
    drop(sup);
    assert!(spawner.live_handles("web").is_empty());
}

#[test]
fn exit_info_prefers_code_over_signal_in_display() {
    let with_code = ExitInfo {
        code: Some(1),
        signal: None,
    };
    let with_signal = ExitInfo {
        code: None,
        signal: Some("SIGTERM".to_owned()),
    };
    assert_eq!(with_code.to_string(), "exit=1");
    assert_eq!(with_signal.to_string(), "signal=SIGTERM");
}
