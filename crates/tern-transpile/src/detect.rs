//! Module-versus-script classification.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::{Result, TranspileError};

/// Source type for `path`, with JSX parsing switched on only when `jsx` is set.
///
/// Everything is parsed as an ES module; plain scripts that rely on sloppy
/// mode features are out of scope for a module-serving dev server.
pub fn source_type_for(path: &Path, jsx: bool) -> Result<SourceType> {
    let source_type = SourceType::from_path(path)
        .map_err(|_| TranspileError::UnsupportedExtension(path.to_path_buf()))?;
    Ok(source_type.with_module(true).with_jsx(jsx))
}

/// Whether `code` has top-level `import` or `export` syntax.
///
/// Run against the first ES module compilation of a TypeScript file, type-only imports
/// have already been erased, so a file that only imports types is a script.
/// Unparseable input is reported as a script; the real compilation surfaces
/// the syntax error.
pub fn detect_module(code: &str, path: &Path, jsx: bool) -> bool {
    let Ok(source_type) = source_type_for(path, jsx) else {
        return false;
    };

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, source_type).parse();
    if parsed.panicked {
        return false;
    }

    parsed.program.body.iter().any(Statement::is_module_declaration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_script_is_not_module() {
        let code = "window.answer = 42;\nfunction greet() { return 'hi'; }";
        assert!(!detect_module(code, Path::new("./a.js"), false));
    }

    #[test]
    fn test_import_makes_module() {
        let code = "import { greet } from './greet.js';\ngreet();";
        assert!(detect_module(code, Path::new("./a.js"), false));
    }

    #[test]
    fn test_export_makes_module() {
        assert!(detect_module("export const x = 1;", Path::new("./a.js"), false));
        assert!(detect_module("export default 1;", Path::new("./a.js"), false));
    }

    #[test]
    fn test_dynamic_import_is_not_module_syntax() {
        let code = "import('./lazy.js').then(m => m.run());";
        assert!(!detect_module(code, Path::new("./a.js"), false));
    }

    #[test]
    fn test_nested_word_export_is_ignored() {
        let code = "const text = 'export const x = 1';";
        assert!(!detect_module(code, Path::new("./a.js"), false));
    }

    #[test]
    fn test_unparseable_is_script() {
        assert!(!detect_module("function (", Path::new("./a.js"), false));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = source_type_for(Path::new("./style.css"), false).unwrap_err();
        assert!(matches!(err, TranspileError::UnsupportedExtension(_)));
    }

    #[test]
    fn test_typescript_source_type() {
        let source_type = source_type_for(Path::new("./a.ts"), false).unwrap();
        assert!(source_type.is_typescript());
        assert!(!source_type.is_jsx());

        let source_type = source_type_for(Path::new("./a.tsx"), true).unwrap();
        assert!(source_type.is_jsx());
    }
}
