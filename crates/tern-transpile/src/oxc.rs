//! OXC-backed [`Transpiler`].

use std::path::Path;
use std::sync::Once;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_transformer::{JsxRuntime, TransformOptions, Transformer};
use tern_config::EsTarget;

use crate::detect::source_type_for;
use crate::diagnostics::Diagnostic;
use crate::error::{Result, TranspileError};
use crate::system::wrap_system;
use crate::{ModuleKind, TranspileOutput, TranspileRequest, Transpiler};

/// Lowest level the OXC transformer can emit.
const LOWEST_SUPPORTED_TARGET: EsTarget = EsTarget::Es2015;

/// Transpiler running the OXC parser, semantic checker, transformer and codegen.
///
/// Diagnostics are the checker's syntax-level semantic findings
/// (redeclarations, invalid assignment targets, misplaced `await`, ...).
/// There is no type checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcTranspiler;

impl OxcTranspiler {
    pub fn new() -> Self {
        Self
    }

    fn transform_options(request: &TranspileRequest<'_>) -> Result<TransformOptions> {
        let target = effective_target(request.target).as_str();
        let mut options =
            TransformOptions::from_target(target).map_err(|e| TranspileError::Target {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        if request.jsx {
            options.jsx.runtime = JsxRuntime::Classic;
        }

        Ok(options)
    }
}

impl Transpiler for OxcTranspiler {
    fn transpile(&self, request: &TranspileRequest<'_>) -> Result<TranspileOutput> {
        let allocator = Allocator::default();
        let source_type = source_type_for(request.path, request.jsx)?;

        let parsed = Parser::new(&allocator, request.source, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            return Err(TranspileError::Syntax {
                file: request.path.to_path_buf(),
                errors: parsed.errors.iter().map(|e| e.to_string()).collect(),
            });
        }
        let mut program = parsed.program;

        let semantic = SemanticBuilder::new()
            .with_check_syntax_error(request.diagnostics)
            .build(&program);

        let diagnostics = if request.diagnostics {
            let file = display_name(request.path);
            semantic
                .errors
                .iter()
                .map(|e| Diagnostic::new(file.clone(), e.to_string()))
                .collect()
        } else {
            Vec::new()
        };

        let options = Self::transform_options(request)?;
        let scoping = semantic.semantic.into_scoping();
        let transformed = Transformer::new(&allocator, request.path, &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(TranspileError::Transform {
                file: request.path.to_path_buf(),
                errors: transformed.errors.iter().map(|e| e.to_string()).collect(),
            });
        }

        let es_code = Codegen::new().build(&program).code;
        let code = match request.module {
            ModuleKind::Esm => es_code,
            ModuleKind::System => wrap_system(&es_code)?,
        };

        tracing::trace!(
            file = %request.path.display(),
            module = ?request.module,
            target = %request.target,
            bytes = code.len(),
            "transpiled"
        );

        Ok(TranspileOutput { code, diagnostics })
    }
}

/// `es5` is accepted in configuration but the transformer stops at
/// `es2015`, so it is clamped there with a single warning per process.
pub fn effective_target(target: EsTarget) -> EsTarget {
    if target != EsTarget::Es5 {
        return target;
    }

    static CLAMPED: Once = Once::new();
    CLAMPED.call_once(|| {
        tracing::warn!(
            "target es5 is not supported by the transformer, emitting {} instead",
            LOWEST_SUPPORTED_TARGET
        );
    });
    LOWEST_SUPPORTED_TARGET
}

fn display_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(source: &'a str, path: &'a str) -> TranspileRequest<'a> {
        TranspileRequest {
            source,
            path: Path::new(path),
            target: EsTarget::Es2020,
            module: ModuleKind::Esm,
            jsx: false,
            diagnostics: false,
        }
    }

    #[test]
    fn test_strips_type_annotations() {
        let output = OxcTranspiler::new()
            .transpile(&request("let n: number = 1;\ninterface A { x: string }", "./a.ts"))
            .unwrap();

        assert!(output.code.contains("let n = 1"));
        assert!(!output.code.contains("interface"));
        assert!(!output.code.contains(": number"));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_es5_is_clamped_to_lowest_supported_target() {
        assert_eq!(effective_target(EsTarget::Es5), EsTarget::Es2015);
        assert_eq!(effective_target(EsTarget::Es2020), EsTarget::Es2020);
        assert_eq!(effective_target(EsTarget::Esnext), EsTarget::Esnext);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = OxcTranspiler::new()
            .transpile(&request("let = ;", "./broken.ts"))
            .unwrap_err();

        match err {
            TranspileError::Syntax { file, errors } => {
                assert_eq!(file, Path::new("./broken.ts"));
                assert!(!errors.is_empty());
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_jsx_classic_runtime() {
        let req = TranspileRequest {
            jsx: true,
            ..request("const el = <div>hi</div>;", "./view.tsx")
        };
        let output = OxcTranspiler::new().transpile(&req).unwrap();
        assert!(output.code.contains("React.createElement"));
    }

    #[test]
    fn test_redeclaration_diagnostic() {
        let req = TranspileRequest {
            diagnostics: true,
            ..request("let a = 1;\nlet a = 2;", "./dup.ts")
        };
        let output = OxcTranspiler::new().transpile(&req).unwrap();

        assert!(!output.diagnostics.is_empty());
        assert_eq!(output.diagnostics[0].file, "./dup.ts");
        assert!(
            output
                .diagnostics
                .iter()
                .any(|d| d.message.contains("already been declared"))
        );
    }

    #[test]
    fn test_diagnostics_skipped_unless_requested() {
        let output = OxcTranspiler::new()
            .transpile(&request("let a = 1;\nlet a = 2;", "./dup.ts"))
            .unwrap();
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_system_module_kind() {
        let req = TranspileRequest {
            module: ModuleKind::System,
            ..request("import { x } from './x.js';\nexport const y: number = x + 1;", "./y.ts")
        };
        let output = OxcTranspiler::new().transpile(&req).unwrap();

        assert!(output.code.starts_with("System.register([\"./x.js\"]"));
        assert!(output.code.contains("exports_1(\"y\", y);"));
    }
}
