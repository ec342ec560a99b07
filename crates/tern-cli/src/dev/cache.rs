//! Compiled-artifact cache with in-flight deduplication.
//!
//! Each served path maps to a slot that is either `Pending` (a compilation is
//! running and every caller awaits the same result) or `Ready` (the finished
//! artifact). A path with no slot is absent. Entries are only ever removed by
//! explicit eviction; there is no size bound.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tern_transpile::TranspileError;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::dev::ServedPath;

/// Compiled JavaScript for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Browser-ready code, including any appended diagnostic statements.
    pub code: Arc<str>,
    /// Number of diagnostics appended to `code`.
    pub diagnostics: usize,
}

impl CompiledArtifact {
    pub fn new(code: impl Into<Arc<str>>, diagnostics: usize) -> Self {
        Self {
            code: code.into(),
            diagnostics,
        }
    }
}

/// Why a compilation produced no artifact.
///
/// Cloneable so one failure can be handed to every caller that was waiting on
/// the same compilation.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error(transparent)]
    Transpile(Arc<TranspileError>),

    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("compilation of {path} did not finish: {message}")]
    Aborted { path: String, message: String },
}

impl From<TranspileError> for CompileError {
    fn from(err: TranspileError) -> Self {
        CompileError::Transpile(Arc::new(err))
    }
}

type Settled = Option<Result<Arc<CompiledArtifact>, CompileError>>;

enum Slot {
    Pending {
        id: u64,
        result: watch::Receiver<Settled>,
    },
    Ready(Arc<CompiledArtifact>),
}

/// Path-keyed store of compiled artifacts.
///
/// Every method takes the lock for a single map operation; it is never held
/// across an `.await`.
#[derive(Default)]
pub struct ArtifactCache {
    slots: Mutex<HashMap<ServedPath, Slot>>,
    next_id: AtomicU64,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished artifact for `path`, if one is stored.
    pub fn get(&self, path: &ServedPath) -> Option<Arc<CompiledArtifact>> {
        match self.slots.lock().get(path) {
            Some(Slot::Ready(artifact)) => Some(Arc::clone(artifact)),
            _ => None,
        }
    }

    /// Store `artifact`, replacing whatever the slot held.
    pub fn put(&self, path: ServedPath, artifact: CompiledArtifact) {
        self.slots.lock().insert(path, Slot::Ready(Arc::new(artifact)));
    }

    /// Remove the entry for `path`.
    ///
    /// Evicting a pending slot detaches it: the running compilation still
    /// answers its callers, but its result is not stored.
    pub fn evict(&self, path: &ServedPath) -> bool {
        self.slots.lock().remove(path).is_some()
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Number of stored artifacts, not counting pending compilations.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the artifact for `path`, compiling it at most once.
    ///
    /// - `Ready`: returned immediately, `compile` is not called.
    /// - `Pending`: waits for the compilation already in flight.
    /// - absent: runs `compile` on a spawned task so a dropped caller cannot
    ///   cancel it, publishes the result to every waiter, and stores it only
    ///   if the slot still belongs to this compilation.
    ///
    /// Failures reach every waiter but are never stored.
    pub async fn get_or_compile<F, Fut>(
        self: &Arc<Self>,
        path: &ServedPath,
        compile: F,
    ) -> Result<Arc<CompiledArtifact>, CompileError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompiledArtifact, CompileError>> + Send + 'static,
    {
        let (id, mut result) = {
            let mut slots = self.slots.lock();
            match slots.get(path) {
                Some(Slot::Ready(artifact)) => {
                    debug!(path = %path, "cache hit");
                    return Ok(Arc::clone(artifact));
                }
                Some(Slot::Pending { id, result }) => {
                    debug!(path = %path, "joining in-flight compilation");
                    (*id, result.clone())
                }
                None => {
                    debug!(path = %path, "cache miss");
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    slots.insert(
                        path.clone(),
                        Slot::Pending {
                            id,
                            result: rx.clone(),
                        },
                    );

                    let cache = Arc::clone(self);
                    let key = path.clone();
                    let job = compile();
                    tokio::spawn(async move {
                        let outcome = job.await.map(Arc::new);
                        cache.settle(&key, id, &outcome);
                        // Every waiter may already be gone.
                        let _ = tx.send(Some(outcome));
                    });

                    (id, rx)
                }
            }
        };

        let settled = match result.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone(),
            Err(_) => None,
        };

        match settled {
            Some(outcome) => outcome,
            None => {
                // The compiling task died without publishing.
                self.abandon(path, id);
                Err(CompileError::Aborted {
                    path: path.to_string(),
                    message: "compilation task ended without a result".to_string(),
                })
            }
        }
    }

    fn settle(
        &self,
        path: &ServedPath,
        id: u64,
        outcome: &Result<Arc<CompiledArtifact>, CompileError>,
    ) {
        let mut slots = self.slots.lock();
        if !Self::owns(&slots, path, id) {
            debug!(path = %path, "slot changed during compilation, discarding result");
            return;
        }

        match outcome {
            Ok(artifact) => {
                slots.insert(path.clone(), Slot::Ready(Arc::clone(artifact)));
            }
            Err(_) => {
                slots.remove(path);
            }
        }
    }

    fn abandon(&self, path: &ServedPath, id: u64) {
        let mut slots = self.slots.lock();
        if Self::owns(&slots, path, id) {
            slots.remove(path);
        }
    }

    fn owns(slots: &HashMap<ServedPath, Slot>, path: &ServedPath, id: u64) -> bool {
        matches!(slots.get(path), Some(Slot::Pending { id: current, .. }) if *current == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn path(p: &str) -> ServedPath {
        ServedPath::from_request(p).unwrap()
    }

    #[test]
    fn test_put_get_evict() {
        let cache = ArtifactCache::new();
        let key = path("/a.ts");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), CompiledArtifact::new("var a = 1;", 0));
        assert_eq!(&*cache.get(&key).unwrap().code, "var a = 1;");
        assert_eq!(cache.len(), 1);

        assert!(cache.evict(&key));
        assert!(!cache.evict(&key));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_second_call_is_a_hit() {
        let cache = Arc::new(ArtifactCache::new());
        let key = path("/a.ts");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let artifact = cache
                .get_or_compile(&key, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(CompiledArtifact::new("compiled", 0))
                })
                .await
                .unwrap();
            assert_eq!(&*artifact.code, "compiled");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_compilation() {
        let cache = Arc::new(ArtifactCache::new());
        let key = path("/shared.ts");
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compile(&key, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(CompiledArtifact::new("once", 0))
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.notify_one();

        for handle in handles {
            let artifact = handle.await.unwrap().unwrap();
            assert_eq!(&*artifact.code, "once");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = Arc::new(ArtifactCache::new());
        let key = path("/broken.ts");

        let err = cache
            .get_or_compile(&key, || async {
                Err(CompileError::Read {
                    path: PathBuf::from("broken.ts"),
                    message: "gone".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gone"));
        assert!(cache.is_empty());

        let artifact = cache
            .get_or_compile(&key, || async { Ok(CompiledArtifact::new("fixed", 0)) })
            .await
            .unwrap();
        assert_eq!(&*artifact.code, "fixed");
    }

    #[tokio::test]
    async fn test_eviction_during_compilation_discards_result() {
        let cache = Arc::new(ArtifactCache::new());
        let key = path("/racy.ts");
        let gate = Arc::new(Notify::new());

        let waiter = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cache
                    .get_or_compile(&key, move || async move {
                        gate.notified().await;
                        Ok(CompiledArtifact::new("stale", 0))
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.evict(&key));
        gate.notify_one();

        // The caller still gets its answer.
        let artifact = waiter.await.unwrap().unwrap();
        assert_eq!(&*artifact.code, "stale");

        // But it was not stored.
        assert!(cache.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel_compilation() {
        let cache = Arc::new(ArtifactCache::new());
        let key = path("/dropped.ts");
        let gate = Arc::new(Notify::new());

        let caller = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cache
                    .get_or_compile(&key, move || async move {
                        gate.notified().await;
                        Ok(CompiledArtifact::new("kept", 0))
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();
        gate.notify_one();

        let stored = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(artifact) = cache.get(&key) {
                    return artifact;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(&*stored.code, "kept");
    }
}
