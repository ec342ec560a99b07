//! Resolved server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{DiagnosticLevel, EsTarget};

/// Immutable server configuration, resolved once at startup.
///
/// Shared behind an `Arc` by every component; nothing mutates it after
/// [`ServerConfig::load`](crate::ServerConfig::load) returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Project root being served. Never read from a config file.
    #[serde(skip)]
    pub root: PathBuf,

    /// HTTP port. The live-reload socket listens on `port + 1`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Watch served files and push reloads to connected browsers.
    #[serde(default)]
    pub watch: bool,

    /// Surface semantic diagnostics in the browser console.
    #[serde(default)]
    pub ts_diagnostics: DiagnosticLevel,

    /// Output language level.
    #[serde(default)]
    pub target: EsTarget,

    /// Answer unresolved paths with 404 instead of the entry document.
    #[serde(default)]
    pub disable_spa: bool,

    /// Directories (relative to the root) left out of static snapshots.
    #[serde(default)]
    pub exclude_dirs: Vec<PathBuf>,

    /// Quiet period before a burst of change events triggers a reload.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

pub fn default_port() -> u16 {
    5000
}

pub fn default_debounce_ms() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            port: default_port(),
            watch: false,
            ts_diagnostics: DiagnosticLevel::None,
            target: EsTarget::default(),
            disable_spa: false,
            exclude_dirs: Vec::new(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ServerConfig {
    /// Configuration rooted at `root` with every other field defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Port of the live-reload WebSocket listener.
    pub fn reload_port(&self) -> u16 {
        self.port.saturating_add(1)
    }

    pub fn spa_enabled(&self) -> bool {
        !self.disable_spa
    }

    /// Whether `relative` (a root-relative path) falls under an excluded directory.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude_dirs.iter().any(|dir| relative.starts_with(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.reload_port(), 5001);
        assert!(!config.watch);
        assert!(config.spa_enabled());
        assert_eq!(config.target, EsTarget::Es5);
        assert_eq!(config.ts_diagnostics, DiagnosticLevel::None);
    }

    #[test]
    fn test_is_excluded() {
        let config = ServerConfig {
            exclude_dirs: vec![PathBuf::from("vendor"), PathBuf::from("test/fixtures")],
            ..ServerConfig::default()
        };

        assert!(config.is_excluded(Path::new("vendor/lib.js")));
        assert!(config.is_excluded(Path::new("test/fixtures/a.ts")));
        assert!(!config.is_excluded(Path::new("test/unit.ts")));
        assert!(!config.is_excluded(Path::new("vendored.js")));
    }

    #[test]
    fn test_root_is_not_serialized() {
        let config = ServerConfig::with_root("/secret/path");
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("root").is_none());
        assert_eq!(json["ts_diagnostics"], "none");
    }
}
