use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, SystemTime};

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const ALWAYS_EXCLUDED: &[&str] = &[".git/**", "node_modules/**", "target/**"];

/// A pane's restart trigger. An invalid pattern is kept but never matches.
#[derive(Debug, Clone)]
pub struct WatchPattern {
    raw: String,
    matcher: Option<GlobMatcher>,
}

impl WatchPattern {
    pub fn new(raw: &str) -> Self {
        let normalized = raw.trim().trim_start_matches("./");
        let matcher = match Glob::new(normalized) {
            Ok(glob) => Some(glob.compile_matcher()),
            Err(error) => {
                warn!(glob = raw, %error, "invalid watch glob; pane will never restart on file changes");
                None
            }
        };
        Self {
            raw: raw.to_owned(),
            matcher,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        self.matcher.is_some()
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        self.matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Changed,
    Removed,
}

impl WatchEventKind {
    pub fn label(self) -> &'static str {
        match self {
            WatchEventKind::Created => "created",
            WatchEventKind::Changed => "changed",
            WatchEventKind::Removed => "removed",
        }
    }
}

/// A file-system change, with `path` relative to the watch root and `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    size: u64,
}

/// Polling watcher: walks the tree and diffs file stamps against the last walk.
#[derive(Debug)]
pub struct FileWatcher {
    root: PathBuf,
    excluded: GlobSet,
    snapshot: BTreeMap<String, FileStamp>,
}

impl FileWatcher {
    /// Takes the baseline snapshot. Changes are reported relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let excluded = build_excludes();
        let snapshot = collect_snapshot(&root, &excluded);
        Self {
            root,
            excluded,
            snapshot,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rescans the tree and returns what changed since the previous scan.
    pub fn poll(&mut self) -> Vec<WatchEvent> {
        let next = collect_snapshot(&self.root, &self.excluded);
        let events = snapshot_diff(&self.snapshot, &next);
        self.snapshot = next;
        events
    }

    /// Moves the watcher onto a background thread. The thread stops once the
    /// receiver is dropped.
    pub fn spawn(root: impl Into<PathBuf>, interval: Duration) -> Receiver<WatchEvent> {
        let (tx, rx) = mpsc::channel();
        let root = root.into();
        thread::spawn(move || {
            let mut watcher = FileWatcher::new(root);
            loop {
                thread::sleep(interval);
                for event in watcher.poll() {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });
        rx
    }
}

fn build_excludes() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in ALWAYS_EXCLUDED {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

fn collect_snapshot(root: &Path, excluded: &GlobSet) -> BTreeMap<String, FileStamp> {
    let mut snapshot = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let rel = normalize(rel);
            rel.is_empty() || !(excluded.is_match(&rel) || excluded.is_match(format!("{rel}/x")))
        });
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!(root = %root.display(), %error, "skipping unreadable watch entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        snapshot.insert(
            normalize(rel),
            FileStamp {
                modified: metadata.modified().ok(),
                size: metadata.len(),
            },
        );
    }
    snapshot
}

fn snapshot_diff(
    old: &BTreeMap<String, FileStamp>,
    new: &BTreeMap<String, FileStamp>,
) -> Vec<WatchEvent> {
    let mut events = Vec::new();
    for (path, stamp) in new {
        let kind = match old.get(path) {
            None => WatchEventKind::Created,
            Some(previous) if previous != stamp => WatchEventKind::Changed,
            Some(_) => continue,
        };
        events.push(WatchEvent {
            kind,
            path: path.clone(),
        });
    }
    for path in old.keys().filter(|path| !new.contains_key(*path)) {
        events.push(WatchEvent {
            kind: WatchEventKind::Removed,
            path: path.clone(),
        });
    }
    events
}

fn normalize(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::UNIX_EPOCH;

    #[test]
    fn star_glob_matches_by_extension_at_any_depth() {
        let pattern = WatchPattern::new("*.js");
        assert!(pattern.matches("app.js"));
        assert!(pattern.matches("src/app.js"));
        assert!(pattern.matches("./app.js"));
        assert!(!pattern.matches("index.css"));
    }

    #[test]
    fn leading_dot_slash_in_pattern_is_ignored() {
        let pattern = WatchPattern::new("./src/**/*.rs");
        assert!(pattern.matches("src/lib.rs"));
        assert!(pattern.matches("src/a/b.rs"));
        assert!(!pattern.matches("tests/a.rs"));
    }

    #[test]
    fn invalid_glob_never_matches() {
        let pattern = WatchPattern::new("src/[unclosed");
        assert!(!pattern.is_valid());
        assert!(!pattern.matches("src/[unclosed"));
        assert_eq!(pattern.as_str(), "src/[unclosed");
    }

    #[test]
    fn poll_reports_created_changed_and_removed_files() {
        let root = temp_workspace("poll");
        fs::write(root.join("keep.txt"), "one").expect("write keep");
        fs::write(root.join("gone.txt"), "bye").expect("write gone");
        let mut watcher = FileWatcher::new(&root);

        fs::write(root.join("keep.txt"), "one plus more").expect("rewrite keep");
        fs::remove_file(root.join("gone.txt")).expect("remove gone");
        fs::create_dir_all(root.join("src")).expect("mkdir src");
        fs::write(root.join("src/new.js"), "x").expect("write new");

        let mut events = watcher.poll();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            events,
            vec![
                WatchEvent {
                    kind: WatchEventKind::Removed,
                    path: "gone.txt".to_owned()
                },
                WatchEvent {
                    kind: WatchEventKind::Changed,
                    path: "keep.txt".to_owned()
                },
                WatchEvent {
                    kind: WatchEventKind::Created,
                    path: "src/new.js".to_owned()
                },
            ]
        );
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn excluded_directories_are_never_reported() {
        let root = temp_workspace("excluded");
        let mut watcher = FileWatcher::new(&root);
        for dir in [".git", "node_modules/pkg", "target/debug"] {
            fs::create_dir_all(root.join(dir)).expect("mkdir");
            fs::write(root.join(dir).join("file.js"), "x").expect("write");
        }

        assert!(watcher.poll().is_empty());
    }

    fn temp_workspace(name: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("panedeck-watch-{name}-{ts}"));
        fs::create_dir_all(&root).expect("mkdir workspace");
        root
    }
}
