//! tern - on-demand TypeScript development server.
//!
//! Requests for scripts are transpiled the first time they are asked for and
//! cached until the file changes on disk. With watching enabled, HTML pages
//! get a small client that reloads the page whenever a served file changes.
//!
//! # Modules
//!
//! - [`dev`] - request router, compile cache, watcher and reload hub
//! - [`commands`] - serve, static build and emsdk install modes
//! - [`cli`] - command-line flags
//! - [`error`] - error types with actionable messages
//! - [`logger`] - `tracing` subscriber setup
//! - [`ui`] - colored terminal output
//!
//! # Example
//!
//! ```rust,no_run
//! use tern_cli::dev::{DevServer, DevServerState};
//! use tern_config::ServerConfig;
//!
//! # async fn run() -> tern_cli::Result<()> {
//! let config = ServerConfig::with_root(".");
//! let (state, _changes) = DevServerState::with_oxc(config)?;
//! DevServer::new(std::sync::Arc::new(state))
//!     .start(std::future::pending())
//!     .await
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, ConfigError, Result, ResultExt};
