//! Error types for the tern CLI.
//!
//! Startup failures (configuration, binding, watcher creation) surface as
//! [`CliError`] and are rendered through `miette` at the top of `main`.
//! Failures while serving a single request never become a `CliError`; the
//! request pipeline maps them to status codes instead.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tern_cli::error::{Result, ResultExt};
//!
//! fn read_entry(root: &Path) -> Result<String> {
//!     let path = root.join("index.html");
//!     std::fs::read_to_string(&path)
//!         .with_path(&path)
//!         .context("Failed to read the entry document")
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub use tern_config::ConfigError;

mod miette;

pub use self::miette::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration loading or validation failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP or WebSocket listener errors
    #[error("Server error: {0}")]
    Server(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Static snapshot failures
    #[error("Static build failed: {0}")]
    StaticBuild(String),

    /// Toolchain installer failures
    #[error("Toolchain installation failed: {0}")]
    Install(String),

    #[error("{0}")]
    Custom(String),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Prefix the error message with `msg`.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
