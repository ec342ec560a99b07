//! Rendering of semantic findings as browser console statements.

use tern_config::DiagnosticLevel;

/// One semantic finding in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Root-relative file name, as served (`./src/app.ts`).
    pub file: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Render `diagnostics` as logging statements to append after compiled code.
///
/// Each finding becomes one line,
/// `console.warn("TypeScript: <file>: <message>");` or `console.error(...)`
/// depending on `level`. Returns an empty string when `level` is
/// [`DiagnosticLevel::None`] or there is nothing to report.
pub fn render_diagnostics(diagnostics: &[Diagnostic], level: DiagnosticLevel) -> String {
    let method = match level {
        DiagnosticLevel::None => return String::new(),
        DiagnosticLevel::Warning => "warn",
        DiagnosticLevel::Error => "error",
    };

    diagnostics
        .iter()
        .map(|diagnostic| {
            let text = format!("TypeScript: {}: {}", diagnostic.file, diagnostic.message);
            // serde_json string output is a valid JS string literal
            let literal = serde_json::Value::String(text).to_string();
            format!("\nconsole.{}({});", method, literal)
        })
        .collect()
}
