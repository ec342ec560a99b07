//! Configuration for the tern development server.
//!
//! A [`ServerConfig`] is resolved exactly once at startup from, in order of
//! increasing priority: built-in defaults, an optional `tern.toml` in the
//! project root, `TERN_*` environment variables, and command-line flags that
//! were explicitly given ([`ConfigOverrides`]). The result is immutable for
//! the lifetime of the process.

pub mod error;
pub mod loading;
pub mod server;
pub mod types;
pub mod validation;

pub use error::{ConfigError, Result};
pub use loading::{CONFIG_FILE_NAME, ConfigOverrides, ENV_PREFIX};
pub use server::ServerConfig;
pub use types::{DiagnosticLevel, EsTarget};
