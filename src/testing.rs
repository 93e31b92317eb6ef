//! In-memory spawner for driving supervisors and panes without real processes.

use std::io::{self, ErrorKind};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::process_manager::{
    ExitInfo, HandleId, ProcessEvent, ProcessEventKind, ProcessHandle, SpawnRequest, Spawner,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnerCall {
    Spawn { pane: String, handle: HandleId },
    Kill { pane: String, handle: HandleId },
}

#[derive(Default)]
struct FakeShared {
    calls: Vec<SpawnerCall>,
    requests: Vec<SpawnRequest>,
    senders: Vec<(String, HandleId, Sender<ProcessEvent>)>,
    failing: Vec<String>,
    live: Vec<(String, HandleId)>,
}

/// Records every spawn and kill in call order. Cloning shares the record.
#[derive(Clone, Default)]
pub struct FakeSpawner {
    shared: Arc<Mutex<FakeShared>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later spawn of `cmd` fail with `NotFound`.
    pub fn fail_command(&self, cmd: impl Into<String>) {
        self.lock().failing.push(cmd.into());
    }

    pub fn calls(&self) -> Vec<SpawnerCall> {
        self.lock().calls.clone()
    }

    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.lock().requests.clone()
    }

    pub fn spawn_count(&self, pane: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, SpawnerCall::Spawn { pane: p, .. } if p == pane))
            .count()
    }

    /// Handles that were spawned and not yet killed.
    pub fn live_handles(&self, pane: &str) -> Vec<HandleId> {
        self.lock()
            .live
            .iter()
            .filter(|(p, _)| p == pane)
            .map(|(_, handle)| *handle)
            .collect()
    }

    pub fn last_handle(&self, pane: &str) -> Option<HandleId> {
        self.lock()
            .senders
            .iter()
            .rev()
            .find(|(p, _, _)| p == pane)
            .map(|(_, handle, _)| *handle)
    }

    pub fn emit_stdout(&self, pane: &str, handle: HandleId, chunk: &str) -> bool {
        self.emit(pane, handle, ProcessEventKind::Stdout(chunk.to_owned()))
    }

    pub fn emit_stderr(&self, pane: &str, handle: HandleId, chunk: &str) -> bool {
        self.emit(pane, handle, ProcessEventKind::Stderr(chunk.to_owned()))
    }

    pub fn emit_exit(&self, pane: &str, handle: HandleId, code: Option<i32>) -> bool {
        self.emit(
            pane,
            handle,
            ProcessEventKind::Exit(ExitInfo { code, signal: None }),
        )
    }

    /// Sends `kind` through the channel given to the spawn of `handle`.
    pub fn emit(&self, pane: &str, handle: HandleId, kind: ProcessEventKind) -> bool {
        let shared = self.lock();
        let Some((_, _, sender)) = shared
            .senders
            .iter()
            .find(|(p, h, _)| p == pane && *h == handle)
        else {
            return false;
        };
        sender
            .send(ProcessEvent {
                pane: pane.to_owned(),
                handle,
                kind,
            })
            .is_ok()
    }

    fn lock(&self) -> MutexGuard<'_, FakeShared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Spawner for FakeSpawner {
    fn spawn(
        &self,
        request: &SpawnRequest,
        events: Sender<ProcessEvent>,
    ) -> io::Result<Box<dyn ProcessHandle>> {
        let mut shared = self.lock();
        if shared.failing.iter().any(|cmd| cmd == &request.cmd) {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{}: command not found", request.cmd),
            ));
        }
        shared.calls.push(SpawnerCall::Spawn {
            pane: request.pane.clone(),
            handle: request.handle,
        });
        shared.requests.push(request.clone());
        shared
            .senders
            .push((request.pane.clone(), request.handle, events));
        shared.live.push((request.pane.clone(), request.handle));
        let pid = 10_000 + u32::try_from(request.handle.0).unwrap_or(0);
        Ok(Box::new(FakeHandle {
            pane: request.pane.clone(),
            handle: request.handle,
            pid,
            killed: false,
            shared: Arc::clone(&self.shared),
        }))
    }
}

pub struct FakeHandle {
    pane: String,
    handle: HandleId,
    pid: u32,
    killed: bool,
    shared: Arc<Mutex<FakeShared>>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;
        let mut shared = self
            .shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shared.calls.push(SpawnerCall::Kill {
            pane: self.pane.clone(),
            handle: self.handle,
        });
        let (pane, handle) = (&self.pane, self.handle);
        shared.live.retain(|(p, h)| !(p == pane && *h == handle));
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/testing_tests.rs"]
mod tests;
