//! On-demand development server.
//!
//! Compiles scripts when they are requested, caches the output until the
//! source changes, and tells connected browsers to reload when a served file
//! is edited.

pub mod cache;
pub mod html;
pub mod path;
pub mod pipeline;
pub mod reload;
pub mod router;
pub mod server;
pub mod state;
pub mod watcher;

pub use cache::{ArtifactCache, CompileError, CompiledArtifact};
pub use html::inject_reload_client;
pub use path::ServedPath;
pub use pipeline::Served;
pub use reload::{BroadcastReport, ClientId, ReloadHub, SendFailure, serve_reload};
pub use router::{RequestKind, SourceKind, classify, dispatch};
pub use server::DevServer;
pub use state::{DevServerState, SharedState};
pub use watcher::{FileChange, FileWatcher, invalidate, run_invalidation};
