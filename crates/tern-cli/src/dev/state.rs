//! Shared state for the development server.
//!
//! One coordinator owns the artifact cache, the watch set and the reload
//! client registry. Handlers and the invalidation loop reach all of it
//! through a [`SharedState`] handle.

use std::sync::Arc;

use oxc_resolver::{ResolveOptions, Resolver};
use tern_config::ServerConfig;
use tern_transpile::{OxcTranspiler, Transpiler};
use tokio::sync::mpsc;
use tracing::warn;

use crate::dev::cache::ArtifactCache;
use crate::dev::reload::ReloadHub;
use crate::dev::watcher::{FileChange, FileWatcher};
use crate::dev::ServedPath;
use crate::error::Result;

/// Development server state.
pub struct DevServerState {
    /// Resolved once at startup, never mutated.
    pub config: Arc<ServerConfig>,

    pub cache: Arc<ArtifactCache>,

    pub watcher: FileWatcher,

    pub reload: Arc<ReloadHub>,

    transpiler: Arc<dyn Transpiler>,

    /// Package-style resolution for bare specifiers.
    resolver: Resolver,
}

impl DevServerState {
    /// Create state for `config` compiling with `transpiler`.
    ///
    /// With watch mode on this starts a file watcher and returns its change
    /// stream; with it off the returned stream is already closed.
    pub fn new(
        config: ServerConfig,
        transpiler: Arc<dyn Transpiler>,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let root = config.root().to_path_buf();
        let (watcher, changes) = if config.watch {
            FileWatcher::new(root)?
        } else {
            let (_, closed) = mpsc::channel(1);
            (FileWatcher::disabled(root), closed)
        };

        let state = Self {
            config: Arc::new(config),
            cache: Arc::new(ArtifactCache::new()),
            watcher,
            reload: Arc::new(ReloadHub::new()),
            transpiler,
            resolver: Resolver::new(resolve_options()),
        };
        Ok((state, changes))
    }

    /// State using the OXC transpiler.
    pub fn with_oxc(config: ServerConfig) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        Self::new(config, Arc::new(OxcTranspiler::new()))
    }

    pub fn transpiler(&self) -> Arc<dyn Transpiler> {
        Arc::clone(&self.transpiler)
    }

    /// Register `path` for change notifications.
    ///
    /// A failure only costs live reload for that file, so it is logged and
    /// the request carries on.
    pub fn watch(&self, path: &ServedPath) {
        if let Err(e) = self.watcher.register_if_absent(path) {
            warn!(path = %path, "failed to watch: {}", e);
        }
    }

    /// Resolve a package specifier from the project root to a served path.
    ///
    /// Resolutions that land outside the root are treated as misses.
    pub fn resolve_package(&self, specifier: &str) -> Option<ServedPath> {
        let root = self.config.root();
        let resolution = self.resolver.resolve(root, specifier).ok()?;
        ServedPath::from_fs_path(root, resolution.path())
    }

    /// Forget memoized package resolutions after files changed.
    pub fn clear_resolution_cache(&self) {
        self.resolver.clear_cache();
    }
}

fn resolve_options() -> ResolveOptions {
    ResolveOptions {
        condition_names: vec!["import".into(), "browser".into(), "default".into()],
        main_fields: vec!["browser".into(), "module".into(), "main".into()],
        extensions: vec![".js".into(), ".mjs".into(), ".ts".into(), ".jsx".into(), ".tsx".into()],
        ..Default::default()
    }
}

/// Shared state handle for passing around the application.
pub type SharedState = Arc<DevServerState>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn state_for(temp: &TempDir, watch: bool) -> DevServerState {
        let config = ServerConfig {
            watch,
            ..ServerConfig::with_root(temp.path().canonicalize().unwrap())
        };
        DevServerState::with_oxc(config).unwrap().0
    }

    #[tokio::test]
    async fn test_watch_disabled_change_stream_is_closed() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig::with_root(temp.path());
        let (state, mut changes) = DevServerState::with_oxc(config).unwrap();

        assert!(!state.watcher.is_enabled());
        assert!(changes.recv().await.is_none());
    }

    #[test]
    fn test_watch_registers_only_when_enabled() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.ts"), "let a = 1;").unwrap();
        let path = ServedPath::from_request("/a.ts").unwrap();

        let off = state_for(&temp, false);
        off.watch(&path);
        assert!(!off.watcher.is_registered(&path));

        let on = state_for(&temp, true);
        on.watch(&path);
        assert!(on.watcher.is_registered(&path));
    }

    #[test]
    fn test_resolve_package_main_field() {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("node_modules/tiny");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{ "name": "tiny", "module": "esm.js", "main": "cjs.js" }"#).unwrap();
        fs::write(pkg.join("esm.js"), "export default 1;").unwrap();
        fs::write(pkg.join("cjs.js"), "module.exports = 1;").unwrap();

        let state = state_for(&temp, false);
        let resolved = state.resolve_package("tiny").unwrap();
        assert_eq!(resolved.as_str(), "./node_modules/tiny/esm.js");
        assert!(state.resolve_package("missing-package").is_none());
    }
}
