//! End-to-end behavior of the OXC adapter as the dev server drives it:
//! first ES module compile, module classification, final compile, diagnostics.

use std::path::Path;

use tern_config::{DiagnosticLevel, EsTarget};
use tern_transpile::{
    ModuleKind, OxcTranspiler, TranspileError, TranspileRequest, Transpiler, detect_module,
    render_diagnostics,
};

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
fn test_esm_then_system_compile_for_module_file() {
    let source = "import { greet } from \"./greet.js\";\nexport const message: string = greet(\"tern\");\n";
    let path = Path::new("./main.ts");
    let transpiler = OxcTranspiler::new();

    let first_pass = transpiler.transpile(&request(source, "./main.ts")).unwrap();
    assert!(detect_module(&first_pass.code, path, false));

    let final_output = transpiler
        .transpile(&TranspileRequest {
            module: ModuleKind::System,
            ..request(source, "./main.ts")
        })
        .unwrap();

    assert!(final_output.code.starts_with("System.register([\"./greet.js\"]"));
    assert!(final_output.code.contains("greet = __m[\"greet\"];"));
    assert!(final_output.code.contains("exports_1(\"message\", message);"));
    assert!(!final_output.code.contains(": string"));
}

#[test]
fn test_type_only_imports_disappear_before_classification() {
    // The import is erased by the transformer, so the emitted file is a plain script.
    let source = "import type { Options } from \"./types.js\";\nconst opts: Options = {};\nconsole.log(opts);\n";
    let output = OxcTranspiler::new()
        .transpile(&request(source, "./script.ts"))
        .unwrap();

    assert!(!detect_module(&output.code, Path::new("./script.ts"), false));
    assert!(!output.code.contains("import"));
}

#[test]
fn test_default_target_compiles() {
    let source = "const depth = (config?.depth ?? 1) as number;\nconsole.log(depth);\n";
    let output = OxcTranspiler::new()
        .transpile(&TranspileRequest {
            target: EsTarget::default(),
            ..request(source, "./depth.ts")
        })
        .unwrap();

    assert!(!output.code.contains("?."));
    assert!(!output.code.contains("??"));
    assert!(!output.code.contains(" as number"));
}

#[test]
fn test_default_target_compiles_system_modules() {
    let output = OxcTranspiler::new()
        .transpile(&TranspileRequest {
            target: EsTarget::default(),
            module: ModuleKind::System,
            ..request("export const answer: number = 42;\n", "./answer.ts")
        })
        .unwrap();

    assert!(output.code.starts_with("System.register([]"));
    assert!(output.code.contains("exports_1(\"answer\", answer);"));
}

#[test]
fn test_tsx_component() {
    let source = "export function App(props: { name: string }) {\n  return <h1>Hello {props.name}</h1>;\n}\n";
    let output = OxcTranspiler::new()
        .transpile(&TranspileRequest {
            jsx: true,
            ..request(source, "./app.tsx")
        })
        .unwrap();

    assert!(output.code.contains("React.createElement"));
    assert!(!output.code.contains("<h1>"));
}

#[test]
fn test_diagnostics_render_as_console_calls() {
    let source = "let count = 1;\nlet count = 2;\n";
    let output = OxcTranspiler::new()
        .transpile(&TranspileRequest {
            diagnostics: true,
            ..request(source, "./count.ts")
        })
        .unwrap();

    assert!(!output.diagnostics.is_empty());
    let rendered = render_diagnostics(&output.diagnostics, DiagnosticLevel::Error);
    assert!(rendered.starts_with("\nconsole.error(\"TypeScript: ./count.ts: "));
    assert!(render_diagnostics(&output.diagnostics, DiagnosticLevel::None).is_empty());
}

#[test]
fn test_syntax_error_names_file() {
    let err = OxcTranspiler::new()
        .transpile(&request("const = ;", "./broken.ts"))
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
fn test_unknown_extension_rejected() {
    let err = OxcTranspiler::new()
        .transpile(&request("body {}", "./style.css"))
        .unwrap_err();
    assert!(matches!(err, TranspileError::UnsupportedExtension(_)));
}

#[test]
fn test_same_request_same_output() {
    let transpiler = OxcTranspiler::new();
    let req = request("export const a: number = 1;\n", "./a.ts");
    assert_eq!(
        transpiler.transpile(&req).unwrap(),
        transpiler.transpile(&req).unwrap()
    );
}
