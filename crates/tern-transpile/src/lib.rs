//! Transpilation adapter for the tern development server.
//!
//! Turns one TypeScript, TSX, JavaScript or JSX source file into JavaScript a
//! browser can execute directly. The adapter is a pure function of its
//! [`TranspileRequest`]: source text, target level, module kind, JSX flag and
//! whether diagnostics should be computed.
//!
//! # Architecture
//!
//! - [`Transpiler`] - the seam the server depends on
//! - [`OxcTranspiler`] - parser → semantic → transformer → codegen via OXC
//! - [`detect`] - classifies output as module or plain script
//! - [`system`] - rewrites an ES module into a `System.register` wrapper
//! - [`diagnostics`] - renders findings as console logging statements
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use tern_config::EsTarget;
//! use tern_transpile::{ModuleKind, OxcTranspiler, TranspileRequest, Transpiler};
//!
//! let request = TranspileRequest {
//!     source: "const answer: number = 42;",
//!     path: Path::new("./answer.ts"),
//!     target: EsTarget::Es2020,
//!     module: ModuleKind::Esm,
//!     jsx: false,
//!     diagnostics: false,
//! };
//! let output = OxcTranspiler::new().transpile(&request).unwrap();
//! assert!(output.code.contains("const answer = 42"));
//! ```

pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod oxc;
pub mod system;

use std::path::Path;

use tern_config::EsTarget;

pub use detect::{detect_module, source_type_for};
pub use diagnostics::{Diagnostic, render_diagnostics};
pub use error::{Result, TranspileError};
pub use oxc::OxcTranspiler;
pub use system::wrap_system;

/// Module format of the emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// ES module output, also used for plain scripts with no imports or exports.
    Esm,
    /// `System.register(...)` wrapper for files that import or export.
    System,
}

/// Everything the adapter needs to compile one file.
#[derive(Debug, Clone, Copy)]
pub struct TranspileRequest<'a> {
    pub source: &'a str,
    /// Root-relative path (`./src/app.ts`). Picks the dialect from its
    /// extension and names the file in diagnostics.
    pub path: &'a Path,
    pub target: EsTarget,
    pub module: ModuleKind,
    /// Apply the classic React JSX transform.
    pub jsx: bool,
    /// Compute semantic diagnostics alongside the output.
    pub diagnostics: bool,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOutput {
    pub code: String,
    /// Empty unless the request asked for diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles source text into browser-executable JavaScript.
///
/// Implementations must be pure: the same request always yields the same
/// output. Compilation is CPU-bound, so async callers run it on a blocking
/// thread.
pub trait Transpiler: Send + Sync {
    fn transpile(&self, request: &TranspileRequest<'_>) -> Result<TranspileOutput>;
}
