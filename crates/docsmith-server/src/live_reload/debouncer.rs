//! Change event debouncing.
//!
//! Editors emit several notifications per save (truncate, write, chmod,
//! rename). The debouncer folds them into one event per path that fires once
//! the path has been quiet for the debounce window.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Removed,
}

impl FsEventKind {
    /// Map a `notify` event kind, ignoring access and metadata-only noise.
    ///
    /// The source end of a rename is a removal and the target end a
    /// creation.
    pub(crate) fn from_notify(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }
}

/// A settled change to one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

impl FsEvent {
    /// Per-path changes carried by one raw `notify` event.
    pub(crate) fn from_notify(event: notify::Event) -> Vec<Self> {
        match event.kind {
            // Paths are `[from, to]`.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .into_iter()
                .zip([FsEventKind::Removed, FsEventKind::Created])
                .map(|(path, kind)| Self { path, kind })
                .collect(),
            // Backends that cannot tell the two ends of a rename apart.
            EventKind::Modify(ModifyKind::Name(RenameMode::Any | RenameMode::Other)) => event
                .paths
                .into_iter()
                .map(|path| {
                    let kind = if path.exists() {
                        FsEventKind::Created
                    } else {
                        FsEventKind::Removed
                    };
                    Self { path, kind }
                })
                .collect(),
            kind => match FsEventKind::from_notify(kind) {
                Some(kind) => event
                    .paths
                    .into_iter()
                    .map(|path| Self { path, kind })
                    .collect(),
                None => Vec::new(),
            },
        }
    }
}

struct Pending {
    kind: FsEventKind,
    deadline: Instant,
}

/// Thread-safe per-path event coalescer.
///
/// [`record`](Self::record) is called from the watcher callback thread,
/// [`drain_ready`](Self::drain_ready) from the session loop.
pub struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    window: Duration,
}

impl EventDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a change, restarting the path's quiet window.
    pub fn record(&self, path: PathBuf, kind: FsEventKind) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.window;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(Pending { kind, deadline });
            }
            Entry::Occupied(mut entry) => match coalesce(entry.get().kind, kind) {
                Some(kind) => {
                    *entry.get_mut() = Pending { kind, deadline };
                }
                // Created then removed: nothing happened as far as the build cares.
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Remove and return every event whose quiet window has elapsed.
    ///
    /// Events come back sorted by path so dispatch order is stable.
    pub fn drain_ready(&self) -> Vec<FsEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, event)| event.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        ready.sort();

        ready
            .into_iter()
            .filter_map(|path| {
                let event = pending.remove(&path)?;
                Some(FsEvent {
                    path,
                    kind: event.kind,
                })
            })
            .collect()
    }

    /// Number of paths waiting for their window to elapse.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Fold a new change into an earlier one for the same path.
#[allow(clippy::match_same_arms)]
fn coalesce(earlier: FsEventKind, later: FsEventKind) -> Option<FsEventKind> {
    use FsEventKind::{Created, Modified, Removed};

    match (earlier, later) {
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        (Modified, later) => Some(later),
        // Write-to-temp-then-rename saves show up as remove + create.
        (Removed, Created) => Some(Modified),
        (Removed, _) => Some(Removed),
    }
}
