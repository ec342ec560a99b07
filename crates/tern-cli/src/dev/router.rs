//! Request classification and dispatch.
//!
//! Every request path is classified exactly once into a [`RequestKind`] and
//! dispatched with an exhaustive match, so there is no "unexpected extension"
//! path at runtime.

use percent_encoding::percent_decode_str;

use crate::dev::pipeline::{self, Served};
use crate::dev::{ServedPath, SharedState};

/// Dialect of a script source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
}

impl SourceKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(SourceKind::TypeScript),
            "tsx" => Some(SourceKind::Tsx),
            "js" | "mjs" | "cjs" => Some(SourceKind::JavaScript),
            "jsx" => Some(SourceKind::Jsx),
            _ => None,
        }
    }

    /// Typed-superset sources get a classifying compile and diagnostics.
    pub fn is_typed(self) -> bool {
        matches!(self, SourceKind::TypeScript | SourceKind::Tsx)
    }

    pub fn jsx(self) -> bool {
        matches!(self, SourceKind::Tsx | SourceKind::Jsx)
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceKind::TypeScript => "ts",
            SourceKind::Tsx => "tsx",
            SourceKind::JavaScript => "js",
            SourceKind::Jsx => "jsx",
        }
    }
}

/// What a request path asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// `/` or `/index.html`.
    Root,
    /// Any other `.html` document.
    Document(ServedPath),
    /// A script to compile.
    Script {
        path: ServedPath,
        source: SourceKind,
    },
    /// No extension on the final segment (`/lodash`, `/src/util`).
    BareSpecifier(ServedPath),
    /// Anything else, served raw.
    Asset(ServedPath),
    /// Undecodable or escaping the project root.
    Invalid,
}

/// Classify a raw (percent-encoded) URL path.
pub fn classify(uri_path: &str) -> RequestKind {
    let Ok(decoded) = percent_decode_str(uri_path).decode_utf8() else {
        return RequestKind::Invalid;
    };

    let Some(path) = ServedPath::from_request(&decoded) else {
        let is_root = decoded.split('/').all(|segment| segment.is_empty() || segment == ".");
        return if is_root {
            RequestKind::Root
        } else {
            RequestKind::Invalid
        };
    };

    if path == ServedPath::entry_document() {
        return RequestKind::Root;
    }

    let Some(extension) = path.extension() else {
        return RequestKind::BareSpecifier(path);
    };

    if let Some(source) = SourceKind::from_extension(extension) {
        RequestKind::Script { path, source }
    } else if extension.eq_ignore_ascii_case("html") || extension.eq_ignore_ascii_case("htm") {
        RequestKind::Document(path)
    } else {
        RequestKind::Asset(path)
    }
}

/// Answer one request for `uri_path`.
pub async fn dispatch(state: &SharedState, uri_path: &str) -> Served {
    match classify(uri_path) {
        RequestKind::Root => pipeline::serve_root(state).await,
        RequestKind::Document(path) => pipeline::serve_document(state, &path).await,
        RequestKind::Script { path, source } => pipeline::serve_script(state, &path, source).await,
        RequestKind::BareSpecifier(path) => pipeline::serve_bare_specifier(state, &path).await,
        RequestKind::Asset(path) => pipeline::serve_asset(state, &path).await,
        RequestKind::Invalid => pipeline::spa_fallback(state).await,
    }
}
