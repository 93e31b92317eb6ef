use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_LENGTH: usize = 2;
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(40);

pub type Snapshot<K, V> = Arc<BTreeMap<K, V>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateOptions {
    /// Number of snapshots retained, newest included. Values below 2 are raised to 2.
    pub max_length: usize,
    /// Longest a burst of updates waits before it is released.
    pub window: Duration,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            window: Duration::ZERO,
        }
    }
}

/// The pair of snapshots that bracket one burst of updates.
#[derive(Debug, Clone)]
pub struct StateChange<K, V> {
    pub previous: Snapshot<K, V>,
    pub current: Snapshot<K, V>,
    pub updates: usize,
}

impl<K: Ord, V: PartialEq> StateChange<K, V> {
    pub fn has_changed(&self, keys: &[K]) -> bool {
        keys.iter()
            .any(|key| self.previous.get(key) != self.current.get(key))
    }

    /// True when the burst ended where it started.
    pub fn is_noop(&self) -> bool {
        Arc::ptr_eq(&self.previous, &self.current) || self.previous == self.current
    }
}

#[derive(Debug)]
struct PendingBurst<K, V> {
    previous: Snapshot<K, V>,
    current: Snapshot<K, V>,
    started: Instant,
    updates: usize,
}

/// Throttles state updates: a burst is released `window` after its first
/// update, however many updates follow. The first `previous` of a burst is
/// kept, later updates only move `current` forward. Updates recorded after a
/// release open the next burst, so the trailing change is never lost.
#[derive(Debug)]
pub struct UpdateCoalescer<K, V> {
    window: Duration,
    pending: Option<PendingBurst<K, V>>,
}

impl<K, V> UpdateCoalescer<K, V> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn record(&mut self, previous: Snapshot<K, V>, current: Snapshot<K, V>, at: Instant) {
        match self.pending.as_mut() {
            Some(burst) => {
                burst.current = current;
                burst.updates += 1;
            }
            None => {
                self.pending = Some(PendingBurst {
                    previous,
                    current,
                    started: at,
                    updates: 1,
                });
            }
        }
    }

    /// When the pending burst becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|burst| burst.started + self.window)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn poll(&mut self, now: Instant) -> Option<StateChange<K, V>> {
        let due = self.deadline().is_some_and(|deadline| now >= deadline);
        if !due {
            return None;
        }
        self.pending.take().map(|burst| StateChange {
            previous: burst.previous,
            current: burst.current,
            updates: burst.updates,
        })
    }
}

/// Change-tracked key/value store. Every `set`/`delete` pushes a fresh
/// immutable snapshot; older snapshots are never touched, so a reader holding
/// one keeps a stable view.
#[derive(Debug)]
pub struct VersionedState<K, V> {
    history: VecDeque<Snapshot<K, V>>,
    max_length: usize,
    coalescer: UpdateCoalescer<K, V>,
}

impl<K, V> VersionedState<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    pub fn new<I>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self::with_options(initial, StateOptions::default())
    }

    pub fn with_options<I>(initial: I, options: StateOptions) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let max_length = options.max_length.max(DEFAULT_MAX_LENGTH);
        let mut history = VecDeque::with_capacity(max_length + 1);
        history.push_front(Arc::new(initial.into_iter().collect::<BTreeMap<K, V>>()));
        Self {
            history,
            max_length,
            coalescer: UpdateCoalescer::new(options.window),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.current().get(key)
    }

    pub fn snapshot(&self) -> Snapshot<K, V> {
        Arc::clone(self.current())
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn set<I>(&mut self, partial: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut next = BTreeMap::clone(self.current());
        next.extend(partial);
        self.push(next);
        self
    }

    pub fn delete(&mut self, key: &K) -> &mut Self {
        let mut next = BTreeMap::clone(self.current());
        next.remove(key);
        self.push(next);
        self
    }

    /// True when any of `keys` differs between the two newest snapshots.
    pub fn has_changed(&self, keys: &[K]) -> bool {
        let (Some(current), Some(previous)) = (self.history.front(), self.history.get(1)) else {
            return false;
        };
        keys.iter().any(|key| previous.get(key) != current.get(key))
    }

    pub fn poll_update(&mut self, now: Instant) -> Option<StateChange<K, V>> {
        self.coalescer.poll(now)
    }

    pub fn update_deadline(&self) -> Option<Instant> {
        self.coalescer.deadline()
    }

    fn current(&self) -> &Snapshot<K, V> {
        // history always holds at least the initial snapshot
        &self.history[0]
    }

    fn push(&mut self, next: BTreeMap<K, V>) {
        let previous = self.snapshot();
        let next = Arc::new(next);
        self.history.push_front(Arc::clone(&next));
        self.history.truncate(self.max_length);
        self.coalescer.record(previous, next, Instant::now());
    }
}
