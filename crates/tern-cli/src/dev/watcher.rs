//! Per-file change watching and cache invalidation.
//!
//! Unlike a project-wide recursive watch, every served file gets its own
//! non-recursive subscription the first time it is served. Change events are
//! mapped back to served paths and handed to [`run_invalidation`], which
//! debounces them per path, evicts the cached artifact and asks every
//! connected browser to reload.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dev::{ServedPath, SharedState};
use crate::error::Result;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(ServedPath),
    Created(ServedPath),
    Removed(ServedPath),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &ServedPath {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    fn from_event(kind: &EventKind, path: ServedPath) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

/// Set of served paths with an active subscription.
///
/// Registration is idempotent and lasts for the process lifetime. When watch
/// mode is off the watcher is inert: nothing is registered and cache entries
/// are never invalidated.
pub struct FileWatcher {
    watcher: Option<Mutex<RecommendedWatcher>>,
    registered: Mutex<HashSet<ServedPath>>,
    root: PathBuf,
}

impl FileWatcher {
    /// Create an active watcher for files under `root`.
    ///
    /// Returns the watcher and the receiving end of its change events.
    pub fn new(root: PathBuf) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let (tx, rx) = mpsc::channel(256);
        let event_root = root.clone();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("file watcher error: {}", e);
                    return;
                }
            };

            for path in &event.paths {
                let Some(served) = ServedPath::from_fs_path(&event_root, path) else {
                    continue;
                };
                let Some(change) = FileChange::from_event(&event.kind, served) else {
                    continue;
                };
                // Never block the notify thread: `rearm` waits on it while
                // the consumer of this channel is busy.
                if let Err(mpsc::error::TrySendError::Full(change)) = tx.try_send(change) {
                    warn!(path = %change.path(), "change queue full, dropping event");
                }
            }
        })?;

        Ok((
            Self {
                watcher: Some(Mutex::new(watcher)),
                registered: Mutex::new(HashSet::new()),
                root,
            },
            rx,
        ))
    }

    /// A watcher that never registers anything.
    pub fn disabled(root: PathBuf) -> Self {
        Self {
            watcher: None,
            registered: Mutex::new(HashSet::new()),
            root,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subscribe to changes of `path` unless it is already registered.
    ///
    /// Returns `true` when a new subscription was created.
    pub fn register_if_absent(&self, path: &ServedPath) -> Result<bool> {
        let Some(watcher) = &self.watcher else {
            return Ok(false);
        };

        let mut registered = self.registered.lock();
        if registered.contains(path) {
            return Ok(false);
        }

        watcher
            .lock()
            .watch(&path.to_fs_path(&self.root), RecursiveMode::NonRecursive)?;
        registered.insert(path.clone());
        debug!(path = %path, "watching");
        Ok(true)
    }

    pub fn is_registered(&self, path: &ServedPath) -> bool {
        self.registered.lock().contains(path)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.lock().len()
    }

    /// Renew the subscription for a path whose file was removed.
    ///
    /// Editors that save by replacing the file leave the old subscription
    /// pointing at a deleted inode. If the file exists again it is watched
    /// afresh; otherwise the registration is dropped and the next request for
    /// it registers again.
    pub fn rearm(&self, path: &ServedPath) {
        let Some(watcher) = &self.watcher else {
            return;
        };

        let fs_path = path.to_fs_path(&self.root);
        let mut registered = self.registered.lock();
        let mut watcher = watcher.lock();
        // The old subscription may already be gone with the file.
        let _ = watcher.unwatch(&fs_path);

        if fs_path.is_file() {
            match watcher.watch(&fs_path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!(path = %path, "re-armed watch");
                    return;
                }
                Err(e) => warn!(path = %path, "failed to re-arm watch: {}", e),
            }
        }
        registered.remove(path);
    }
}

/// Consume change events until the channel closes.
///
/// Each path is debounced on its own: it is handled once no further event for
/// it arrived for `debounce`. Handling evicts the cached artifact and sends
/// one reload broadcast per batch of paths that settled together. Events for
/// paths that were never registered are dropped.
pub async fn run_invalidation(
    state: SharedState,
    mut changes: mpsc::Receiver<FileChange>,
    debounce: Duration,
) {
    let mut pending: HashMap<ServedPath, (Instant, bool)> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|(deadline, _)| *deadline).min();

        tokio::select! {
            change = changes.recv() => {
                let Some(change) = change else { break };
                if !state.watcher.is_registered(change.path()) {
                    continue;
                }

                let removed = matches!(change, FileChange::Removed(_));
                let deadline = Instant::now() + debounce;
                let entry = pending.entry(change.path().clone()).or_insert((deadline, false));
                entry.0 = deadline;
                entry.1 |= removed;
            }

            _ = sleep_until(next_deadline), if next_deadline.is_some() => {
                let now = Instant::now();
                let due: Vec<(ServedPath, bool)> = pending
                    .iter()
                    .filter(|(_, (deadline, _))| *deadline <= now)
                    .map(|(path, (_, removed))| (path.clone(), *removed))
                    .collect();

                for (path, removed) in &due {
                    pending.remove(path);
                    if *removed {
                        state.watcher.rearm(path);
                    }
                }
                invalidate(&state, due.iter().map(|(path, _)| path));
            }
        }
    }

    debug!("change stream closed, invalidation loop finished");
}

/// Evict `paths` and notify every reload client once.
pub fn invalidate<'a>(state: &SharedState, paths: impl IntoIterator<Item = &'a ServedPath>) {
    let mut changed = 0usize;
    for path in paths {
        let evicted = state.cache.evict(path);
        info!(path = %path, evicted, "file changed");
        changed += 1;
    }
    if changed == 0 {
        return;
    }

    state.clear_resolution_cache();
    let report = state.reload.notify_all();
    report.log();
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
