use std::collections::VecDeque;
use std::sync::Arc;

use crate::process_manager::{HandleId, ProcessPhase};
use crate::state::VersionedState;

pub const MAX_LOG_ENTRIES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Stdout,
    Stderr,
    /// Supervisor bookkeeping: restarts, exits, spawn failures.
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub content: Arc<str>,
}

/// Append-only log shared between snapshots. Pushing copies the entry list
/// only when an older snapshot still holds it.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: Arc<VecDeque<LogEntry>>,
}

impl PartialEq for LogBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries) || self.entries == other.entries
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn push(&mut self, kind: LogKind, content: impl Into<Arc<str>>) {
        let entries = Arc::make_mut(&mut self.entries);
        entries.push_back(LogEntry {
            kind,
            content: content.into(),
        });
        while entries.len() > MAX_LOG_ENTRIES {
            entries.pop_front();
        }
    }
}

/// Lifecycle fields the supervisor publishes for the current process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessStatus {
    pub phase: ProcessPhase,
    pub handle: Option<HandleId>,
    pub pid: Option<u32>,
    pub code: Option<i32>,
    pub signal: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PaneKey {
    Status,
    Data,
    ShowErrors,
    ShowLogs,
    IsFullScreen,
    IsMenuVisible,
    MenuSelection,
    Restarts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaneValue {
    Flag(bool),
    Count(usize),
    Status(ProcessStatus),
    Log(LogBuffer),
}

pub type PaneState = VersionedState<PaneKey, PaneValue>;

impl VersionedState<PaneKey, PaneValue> {
    pub fn flag(&self, key: PaneKey) -> bool {
        matches!(self.get(&key), Some(PaneValue::Flag(true)))
    }

    pub fn count(&self, key: PaneKey) -> usize {
        match self.get(&key) {
            Some(PaneValue::Count(value)) => *value,
            _ => 0,
        }
    }

    pub fn status(&self) -> ProcessStatus {
        match self.get(&PaneKey::Status) {
            Some(PaneValue::Status(status)) => status.clone(),
            _ => ProcessStatus::default(),
        }
    }

    pub fn log(&self) -> LogBuffer {
        match self.get(&PaneKey::Data) {
            Some(PaneValue::Log(buffer)) => buffer.clone(),
            _ => LogBuffer::new(),
        }
    }

    pub fn push_log(&mut self, kind: LogKind, content: impl Into<Arc<str>>) -> &mut Self {
        let mut buffer = self.log();
        buffer.push(kind, content);
        self.set([(PaneKey::Data, PaneValue::Log(buffer))])
    }

    pub fn clear_log(&mut self) -> &mut Self {
        self.set([(PaneKey::Data, PaneValue::Log(LogBuffer::new()))])
    }
}
