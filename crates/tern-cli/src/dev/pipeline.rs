//! Compile-and-serve pipeline.
//!
//! Turns a classified request into a [`Served`] response: documents are read
//! fresh and run through the HTML injector, scripts go through the artifact
//! cache and assets are sent raw. Every miss ends in the single-page-app
//! fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tern_config::{DiagnosticLevel, EsTarget};
use tern_transpile::{ModuleKind, TranspileRequest, Transpiler, detect_module, render_diagnostics};
use tracing::{debug, error, info};

use crate::dev::cache::{CompileError, CompiledArtifact};
use crate::dev::html::inject_reload_client;
use crate::dev::router::SourceKind;
use crate::dev::{ServedPath, SharedState};

pub const JAVASCRIPT: &str = "application/javascript";
pub const HTML: &str = "text/html; charset=utf-8";
pub const TEXT: &str = "text/plain; charset=utf-8";

/// Siblings tried, in order, when a requested `.js` file does not exist.
const JS_FALLBACKS: [SourceKind; 3] = [SourceKind::TypeScript, SourceKind::Tsx, SourceKind::Jsx];

/// A fully rendered response, independent of the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Bytes,
}

impl Served {
    pub fn javascript(code: &str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(JAVASCRIPT),
            body: Bytes::copy_from_slice(code.as_bytes()),
        }
    }

    pub fn html(document: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(HTML),
            body: Bytes::from(document),
        }
    }

    pub fn asset(content: Vec<u8>, content_type: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(content_type),
            body: Bytes::from(content),
        }
    }

    /// 404 with an empty body.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn internal_error(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            content_type: Some(TEXT),
            body: Bytes::from(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl IntoResponse for Served {
    fn into_response(self) -> Response {
        let mut response = (self.status, Body::from(self.body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
        }
        response
    }
}

/// `/`: the entry document, read from disk on every request. 404 when the
/// project has no `index.html`.
pub async fn serve_root(state: &SharedState) -> Served {
    match load_document(state, &ServedPath::entry_document()).await {
        Some(html) => Served::html(html),
        None => Served::not_found(),
    }
}

/// Any other `.html` file; a missing one falls back to the entry document.
pub async fn serve_document(state: &SharedState, path: &ServedPath) -> Served {
    match load_document(state, path).await {
        Some(html) => Served::html(html),
        None => spa_fallback(state).await,
    }
}

/// Entry document with status 200, or an empty 404 when the single-page-app
/// fallback is disabled.
pub async fn spa_fallback(state: &SharedState) -> Served {
    if !state.config.spa_enabled() {
        return Served::not_found();
    }

    match load_document(state, &ServedPath::entry_document()).await {
        Some(html) => Served::html(html),
        None => Served::not_found(),
    }
}

async fn load_document(state: &SharedState, path: &ServedPath) -> Option<String> {
    let file = path.to_fs_path(state.config.root());
    let html = match tokio::fs::read_to_string(&file).await {
        Ok(html) => html,
        Err(e) => {
            debug!(path = %path, "document unavailable: {}", e);
            return None;
        }
    };

    state.watch(path);
    let config = &state.config;
    Some(inject_reload_client(&html, config.watch, config.reload_port()).into_owned())
}

/// A script request. `.js` requests for files that do not exist fall back to
/// `.ts`, `.tsx` and `.jsx` siblings.
pub async fn serve_script(state: &SharedState, path: &ServedPath, source: SourceKind) -> Served {
    if let Some(artifact) = state.cache.get(path) {
        debug!(path = %path, "cache hit");
        return Served::javascript(&artifact.code);
    }

    if is_file(state, path).await {
        return compile_and_serve(state, path, source).await;
    }

    if path.extension() == Some("js") {
        for fallback in JS_FALLBACKS {
            let sibling = path.with_extension(fallback.extension());
            if state.cache.get(&sibling).is_some() || is_file(state, &sibling).await {
                return compile_and_serve(state, &sibling, fallback).await;
            }
        }
    }

    spa_fallback(state).await
}

/// A path without an extension: the file as-is (compiled as JavaScript),
/// then with `.ts` appended, then package resolution from the project root.
pub async fn serve_bare_specifier(state: &SharedState, path: &ServedPath) -> Served {
    if is_file(state, path).await {
        return compile_and_serve(state, path, SourceKind::JavaScript).await;
    }

    let typed = path.with_appended("ts");
    if state.cache.get(&typed).is_some() || is_file(state, &typed).await {
        return compile_and_serve(state, &typed, SourceKind::TypeScript).await;
    }

    if let Some(resolved) = state.resolve_package(path.relative()) {
        debug!(specifier = path.relative(), resolved = %resolved, "resolved package");
        return match resolved.extension().and_then(SourceKind::from_extension) {
            Some(source) => compile_and_serve(state, &resolved, source).await,
            None => serve_asset(state, &resolved).await,
        };
    }

    spa_fallback(state).await
}

/// Raw file bytes with a MIME type from the extension.
pub async fn serve_asset(state: &SharedState, path: &ServedPath) -> Served {
    let file = path.to_fs_path(state.config.root());
    match tokio::fs::read(&file).await {
        Ok(content) => {
            state.watch(path);
            Served::asset(content, determine_content_type(path.as_str()))
        }
        Err(e) => {
            debug!(path = %path, "asset unavailable: {}", e);
            spa_fallback(state).await
        }
    }
}

/// Serve `path` from the cache, compiling it on a miss.
///
/// Transpile failures answer 500 with the error text and are not cached.
pub async fn compile_and_serve(state: &SharedState, path: &ServedPath, source: SourceKind) -> Served {
    state.watch(path);

    let job_state = Arc::clone(state);
    let key = path.clone();
    let result = state
        .cache
        .get_or_compile(path, move || compile(job_state, key, source))
        .await;

    match result {
        Ok(artifact) => Served::javascript(&artifact.code),
        Err(err) => {
            error!(path = %path, "compilation failed: {}", err);
            Served::internal_error(err.to_string())
        }
    }
}

async fn compile(
    state: SharedState,
    path: ServedPath,
    source: SourceKind,
) -> Result<CompiledArtifact, CompileError> {
    let file = path.to_fs_path(state.config.root());
    let text = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| CompileError::Read {
            path: file,
            message: e.to_string(),
        })?;

    let transpiler = state.transpiler();
    let target = state.config.target;
    let level = state.config.ts_diagnostics;
    let dialect_path = dialect_path(&path, source);

    let started = std::time::Instant::now();
    let artifact = tokio::task::spawn_blocking(move || {
        transpile_source(transpiler.as_ref(), &text, &dialect_path, source, target, level)
    })
    .await
    .map_err(|e| CompileError::Aborted {
        path: path.to_string(),
        message: e.to_string(),
    })??;

    info!(
        path = %path,
        diagnostics = artifact.diagnostics,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compiled"
    );
    Ok(artifact)
}

/// Path handed to the transpiler: picks the parser dialect and names the
/// file in diagnostics. Extension-less files borrow their dialect's
/// extension.
fn dialect_path(path: &ServedPath, source: SourceKind) -> PathBuf {
    if path.extension().and_then(SourceKind::from_extension).is_some() {
        PathBuf::from(path.as_str())
    } else {
        PathBuf::from(path.with_appended(source.extension()).as_str())
    }
}

/// Compile one source text.
///
/// Typed sources are compiled twice: first as an ES module to learn
/// whether the emitted code imports or exports anything, then the real
/// compile in the matching module format. Plain scripts are classified from
/// their own text and compiled once.
pub fn transpile_source(
    transpiler: &dyn Transpiler,
    source: &str,
    path: &Path,
    kind: SourceKind,
    target: EsTarget,
    level: DiagnosticLevel,
) -> Result<CompiledArtifact, CompileError> {
    let jsx = kind.jsx();
    let base = TranspileRequest {
        source,
        path,
        target,
        module: ModuleKind::Esm,
        jsx,
        diagnostics: false,
    };

    let is_module = if kind.is_typed() {
        let first_pass = transpiler.transpile(&base)?;
        detect_module(&first_pass.code, path, jsx)
    } else {
        detect_module(source, path, jsx)
    };

    let diagnostics = kind.is_typed() && level.is_enabled();
    let output = transpiler.transpile(&TranspileRequest {
        module: if is_module {
            ModuleKind::System
        } else {
            ModuleKind::Esm
        },
        diagnostics,
        ..base
    })?;

    let mut code = output.code;
    if diagnostics {
        code.push_str(&render_diagnostics(&output.diagnostics, level));
    }

    Ok(CompiledArtifact::new(code, output.diagnostics.len()))
}

async fn is_file(state: &SharedState, path: &ServedPath) -> bool {
    tokio::fs::metadata(path.to_fs_path(state.config.root()))
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Determine content type from file extension.
pub fn determine_content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "wasm" => "application/wasm",
        "js" | "mjs" | "cjs" => JAVASCRIPT,
        "json" | "map" => "application/json",
        "html" | "htm" => HTML,
        "css" => "text/css",
        "txt" => TEXT,
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tern_transpile::{TranspileOutput, TranspileError};

    /// Records each request and echoes a fixed output.
    struct Recording {
        calls: Mutex<Vec<(ModuleKind, bool)>>,
        output: String,
    }

    impl Recording {
        fn new(output: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                output: output.to_string(),
            }
        }
    }

    impl Transpiler for Recording {
        fn transpile(&self, request: &TranspileRequest<'_>) -> tern_transpile::Result<TranspileOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((request.module, request.diagnostics));
            Ok(TranspileOutput {
                code: self.output.clone(),
                diagnostics: Vec::new(),
            })
        }
    }

    #[test]
    fn test_typed_source_classifies_then_compiles() {
        let fake = Recording::new("export const a = 1;\n");
        transpile_source(
            &fake,
            "export const a: number = 1;",
            Path::new("./a.ts"),
            SourceKind::TypeScript,
            EsTarget::Es5,
            DiagnosticLevel::Warning,
        )
        .unwrap();

        let calls = fake.calls.lock().unwrap();
        assert_eq!(*calls, vec![(ModuleKind::Esm, false), (ModuleKind::System, true)]);
    }

    #[test]
    fn test_typed_script_without_exports_stays_esm() {
        let fake = Recording::new("console.log(1);\n");
        transpile_source(
            &fake,
            "console.log(1 as number);",
            Path::new("./a.ts"),
            SourceKind::TypeScript,
            EsTarget::Es5,
            DiagnosticLevel::None,
        )
        .unwrap();

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.last(), Some(&(ModuleKind::Esm, false)));
    }

    #[test]
    fn test_plain_script_compiles_once_without_diagnostics() {
        let fake = Recording::new("import x from './x.js';\n");
        transpile_source(
            &fake,
            "import x from './x.js';",
            Path::new("./a.js"),
            SourceKind::JavaScript,
            EsTarget::Es5,
            DiagnosticLevel::Error,
        )
        .unwrap();

        let calls = fake.calls.lock().unwrap();
        assert_eq!(*calls, vec![(ModuleKind::System, false)]);
    }

    #[test]
    fn test_transpile_error_propagates() {
        struct Failing;
        impl Transpiler for Failing {
            fn transpile(&self, request: &TranspileRequest<'_>) -> tern_transpile::Result<TranspileOutput> {
                Err(TranspileError::Syntax {
                    file: request.path.to_path_buf(),
                    errors: vec!["Unexpected token".to_string()],
                })
            }
        }

        let err = transpile_source(
            &Failing,
            "const = ;",
            Path::new("./bad.ts"),
            SourceKind::TypeScript,
            EsTarget::Es5,
            DiagnosticLevel::None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unexpected token"));
    }

    #[test]
    fn test_dialect_path_for_extensionless_file() {
        let bare = ServedPath::from_request("/bin/tool").unwrap();
        assert_eq!(dialect_path(&bare, SourceKind::JavaScript), PathBuf::from("./bin/tool.js"));

        let ts = ServedPath::from_request("/a.ts").unwrap();
        assert_eq!(dialect_path(&ts, SourceKind::TypeScript), PathBuf::from("./a.ts"));
    }

    #[test]
    fn test_determine_content_type() {
        assert_eq!(determine_content_type("./app.js"), JAVASCRIPT);
        assert_eq!(determine_content_type("./style.CSS"), "text/css");
        assert_eq!(determine_content_type("./logo.svg"), "image/svg+xml");
        assert_eq!(determine_content_type("./module.wasm"), "application/wasm");
        assert_eq!(determine_content_type("./unknown.xyz"), "application/octet-stream");
    }

    #[test]
    fn test_served_response_headers() {
        let response = Served::javascript("var a;").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()[header::CONTENT_TYPE], JAVASCRIPT);

        let missing = Served::not_found().into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(missing.headers().get(header::CONTENT_TYPE).is_none());
    }
}
