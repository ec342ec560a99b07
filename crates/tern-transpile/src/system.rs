//! `System.register` wrapper for ES module output.
//!
//! Rewrites the top level of an ES module into the SystemJS registration
//! format: every `import` becomes a dependency with a setter that assigns the
//! imported bindings, every `export` becomes a call to the registration's
//! export function. Exported bindings stay live: each assignment or update
//! of one, anywhere in the module, is wrapped so the new value is published
//! again. `for (x of ...)` heads are the one write form left unwrapped.

use std::collections::HashMap;
use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_ast::AstKind;
use oxc_ast::ast::{
    AssignmentTarget, Declaration, ExportAllDeclaration, ExportDefaultDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, ImportDeclaration,
    ImportDeclarationSpecifier, ModuleDeclaration, Program,
};
use oxc_parser::Parser;
use oxc_semantic::{SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType, Span};

use crate::error::{Result, TranspileError};

const EXPORTS: &str = "exports_1";
const CONTEXT: &str = "context_1";
const SETTER_ARG: &str = "__m";
/// Holds the result of a write whose value must survive re-publishing.
const SAVED_VALUE: &str = "__value";

/// Wrap ES module `code` in `System.register([...], function (exports_1, context_1) { ... })`.
///
/// Non-module statements are carried over in order into the `execute`
/// function, with writes to exported bindings re-published.
pub fn wrap_system(code: &str) -> Result<String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(TranspileError::Syntax {
            file: PathBuf::from("<generated module>"),
            errors: parsed.errors.iter().map(|e| e.to_string()).collect(),
        });
    }

    let mut module = SystemModule::new(code, live_writes(&parsed.program));
    for statement in &parsed.program.body {
        match statement.as_module_declaration() {
            Some(declaration) => module.module_declaration(declaration),
            None => {
                let text = module.source(statement.span());
                module.body.push(text);
            }
        }
    }

    Ok(module.render())
}

/// How a rewritten write hands back its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    /// `x = v`, `x += v`, `++x`: the expression already yields the new value.
    Value,
    /// `x++` and destructuring: publish afterwards, yield the original result.
    Saved,
}

/// An assignment or update expression that writes exported bindings.
#[derive(Debug)]
struct LiveWrite {
    span: Span,
    kind: WriteKind,
    /// `(local, exported)` pairs written by the expression.
    exports: Vec<(String, String)>,
}

impl LiveWrite {
    fn wrap(&self, expression: &str) -> String {
        match self.kind {
            WriteKind::Value => self
                .exports
                .iter()
                .fold(expression.to_string(), |inner, (_, exported)| {
                    format!("{}({}, {})", EXPORTS, js_string(exported), inner)
                }),
            WriteKind::Saved => {
                let mut out = format!("({} = {}", SAVED_VALUE, expression);
                for (local, exported) in &self.exports {
                    out.push_str(&format!(", {}({}, {})", EXPORTS, js_string(exported), local));
                }
                out.push_str(&format!(", {})", SAVED_VALUE));
                out
            }
        }
    }
}

/// Local binding name to the names it is exported under.
fn exported_locals(program: &Program<'_>) -> Vec<(String, String)> {
    let mut exports = Vec::new();
    for statement in &program.body {
        match statement.as_module_declaration() {
            Some(ModuleDeclaration::ExportNamedDeclaration(export)) if export.source.is_none() => {
                match &export.declaration {
                    Some(Declaration::VariableDeclaration(variables)) => {
                        for declarator in &variables.declarations {
                            for id in declarator.id.get_binding_identifiers() {
                                exports.push((id.name.to_string(), id.name.to_string()));
                            }
                        }
                    }
                    Some(Declaration::FunctionDeclaration(function)) => {
                        if let Some(id) = &function.id {
                            exports.push((id.name.to_string(), id.name.to_string()));
                        }
                    }
                    Some(Declaration::ClassDeclaration(class)) => {
                        if let Some(id) = &class.id {
                            exports.push((id.name.to_string(), id.name.to_string()));
                        }
                    }
                    _ => {}
                }
                for specifier in &export.specifiers {
                    exports.push((
                        specifier.local.name().to_string(),
                        specifier.exported.name().to_string(),
                    ));
                }
            }
            Some(ModuleDeclaration::ExportDefaultDeclaration(export)) => {
                let id = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                        function.id.as_ref()
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref(),
                    _ => None,
                };
                if let Some(id) = id {
                    exports.push((id.name.to_string(), "default".to_string()));
                }
            }
            _ => {}
        }
    }
    exports
}

/// Every write to an exported top-level binding, ordered by start offset
/// with enclosing writes before the writes nested in them.
fn live_writes<'a>(program: &'a Program<'a>) -> Vec<LiveWrite> {
    let exported = exported_locals(program);
    if exported.is_empty() {
        return Vec::new();
    }

    let semantic = SemanticBuilder::new().build(program).semantic;
    let scoping = semantic.scoping();
    let nodes = semantic.nodes();

    let mut names: HashMap<SymbolId, Vec<String>> = HashMap::new();
    for (local, name) in exported {
        if let Some(symbol) = scoping.get_root_binding(&local) {
            let entry = names.entry(symbol).or_default();
            if !entry.contains(&name) {
                entry.push(name);
            }
        }
    }

    let mut targets: Vec<(Span, SymbolId)> = Vec::new();
    for &symbol in names.keys() {
        for reference in scoping.get_resolved_references(symbol) {
            if reference.is_write() {
                targets.push((nodes.kind(reference.node_id()).span(), symbol));
            }
        }
    }
    if targets.is_empty() {
        return Vec::new();
    }

    let written_in = |target: Span| -> Vec<(String, String)> {
        let mut symbols: Vec<SymbolId> = Vec::new();
        for (span, symbol) in &targets {
            if span.start >= target.start && span.end <= target.end && !symbols.contains(symbol)
            {
                symbols.push(*symbol);
            }
        }
        symbols.sort_by_key(|symbol| {
            targets
                .iter()
                .filter(|(_, s)| s == symbol)
                .map(|(span, _)| span.start)
                .min()
        });
        symbols
            .into_iter()
            .flat_map(|symbol| {
                let local = scoping.symbol_name(symbol).to_string();
                names[&symbol]
                    .iter()
                    .map(move |name| (local.clone(), name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    let mut writes = Vec::new();
    for node in nodes.iter() {
        let (span, target, kind) = match node.kind() {
            AstKind::AssignmentExpression(assignment) => {
                let kind = if matches!(assignment.left, AssignmentTarget::AssignmentTargetIdentifier(_))
                {
                    WriteKind::Value
                } else {
                    WriteKind::Saved
                };
                (assignment.span, assignment.left.span(), kind)
            }
            AstKind::UpdateExpression(update) => {
                let kind = if update.prefix {
                    WriteKind::Value
                } else {
                    WriteKind::Saved
                };
                (update.span, update.argument.span(), kind)
            }
            _ => continue,
        };

        let exports = written_in(target);
        if !exports.is_empty() {
            writes.push(LiveWrite {
                span,
                kind,
                exports,
            });
        }
    }

    writes.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.end.cmp(&a.span.end))
    });
    writes
}

/// Text of `span` with every write in `writes` wrapped. `writes` must lie
/// inside `span`, ordered as [`live_writes`] returns them.
fn rewrite(code: &str, span: Span, writes: &[&LiveWrite]) -> String {
    let mut out = String::with_capacity((span.end - span.start) as usize);
    let mut pos = span.start as usize;
    let mut rest = writes;

    while let Some((write, tail)) = rest.split_first() {
        let nested = tail
            .iter()
            .take_while(|inner| inner.span.start < write.span.end)
            .count();
        out.push_str(&code[pos..write.span.start as usize]);
        out.push_str(&write.wrap(&rewrite(code, write.span, &tail[..nested])));
        pos = write.span.end as usize;
        rest = &tail[nested..];
    }

    out.push_str(&code[pos..span.end as usize]);
    out
}

struct Dependency {
    specifier: String,
    setter: Vec<String>,
}

struct SystemModule<'a> {
    code: &'a str,
    writes: Vec<LiveWrite>,
    deps: Vec<Dependency>,
    /// Import bindings, declared once at the top of the registration.
    bindings: Vec<String>,
    /// Exports of hoisted function declarations, published before anything runs.
    hoisted: Vec<String>,
    body: Vec<String>,
    /// `export { a as b }` lists, published once the body has run.
    trailing: Vec<String>,
}

impl<'a> SystemModule<'a> {
    fn new(code: &'a str, writes: Vec<LiveWrite>) -> Self {
        let mut bindings = Vec::new();
        if writes.iter().any(|write| write.kind == WriteKind::Saved) {
            bindings.push(SAVED_VALUE.to_string());
        }
        Self {
            code,
            writes,
            deps: Vec::new(),
            bindings,
            hoisted: Vec::new(),
            body: Vec::new(),
            trailing: Vec::new(),
        }
    }

    /// Source text of `span` with live-binding rewrites applied.
    fn source(&self, span: Span) -> String {
        let inside: Vec<&LiveWrite> = self
            .writes
            .iter()
            .filter(|write| write.span.start >= span.start && write.span.end <= span.end)
            .collect();
        rewrite(self.code, span, &inside)
    }

    fn dependency(&mut self, specifier: &str) -> &mut Vec<String> {
        let index = match self.deps.iter().position(|d| d.specifier == specifier) {
            Some(index) => index,
            None => {
                self.deps.push(Dependency {
                    specifier: specifier.to_string(),
                    setter: Vec::new(),
                });
                self.deps.len() - 1
            }
        };
        &mut self.deps[index].setter
    }

    fn module_declaration(&mut self, declaration: &ModuleDeclaration<'_>) {
        match declaration {
            ModuleDeclaration::ImportDeclaration(import) => self.import(import),
            ModuleDeclaration::ExportNamedDeclaration(export) => self.export_named(export),
            ModuleDeclaration::ExportDefaultDeclaration(export) => self.export_default(export),
            ModuleDeclaration::ExportAllDeclaration(export) => self.export_all(export),
            // TypeScript-only forms never survive the transformer
            ModuleDeclaration::TSExportAssignment(_)
            | ModuleDeclaration::TSNamespaceExportDeclaration(_) => {}
        }
    }

    fn import(&mut self, import: &ImportDeclaration<'_>) {
        let mut assignments = Vec::new();
        for specifier in import.specifiers.iter().flatten() {
            let (local, value) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    (s.local.name.as_str(), member(s.imported.name().as_str()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (s.local.name.as_str(), member("default"))
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.as_str(), SETTER_ARG.to_string())
                }
            };
            if !self.bindings.iter().any(|b| b == local) {
                self.bindings.push(local.to_string());
            }
            assignments.push(format!("{} = {};", local, value));
        }
        self.dependency(import.source.value.as_str()).extend(assignments);
    }

    fn export_named(&mut self, export: &ExportNamedDeclaration<'_>) {
        if let Some(source) = &export.source {
            let calls: Vec<String> = export
                .specifiers
                .iter()
                .map(|s| export_call(s.exported.name().as_str(), &member(s.local.name().as_str())))
                .collect();
            self.dependency(source.value.as_str()).extend(calls);
            return;
        }

        if let Some(declaration) = &export.declaration {
            let text = self.source(declaration.span());
            self.body.push(text);
            match declaration {
                Declaration::VariableDeclaration(variables) => {
                    for declarator in &variables.declarations {
                        for id in declarator.id.get_binding_identifiers() {
                            let name = id.name.as_str();
                            self.body.push(export_call(name, name));
                        }
                    }
                }
                Declaration::FunctionDeclaration(function) => {
                    if let Some(id) = &function.id {
                        let name = id.name.as_str();
                        self.hoisted.push(export_call(name, name));
                    }
                }
                Declaration::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        let name = id.name.as_str();
                        self.body.push(export_call(name, name));
                    }
                }
                _ => {}
            }
        }

        for specifier in &export.specifiers {
            self.trailing.push(export_call(
                specifier.exported.name().as_str(),
                specifier.local.name().as_str(),
            ));
        }
    }

    fn export_default(&mut self, export: &ExportDefaultDeclaration<'_>) {
        let text = self.source(export.declaration.span());
        let named = match &export.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                function.id.as_ref().map(|id| (id.name.as_str(), true))
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                class.id.as_ref().map(|id| (id.name.as_str(), false))
            }
            _ => None,
        };

        match named {
            Some((name, hoist)) => {
                self.body.push(text);
                let call = export_call("default", name);
                if hoist {
                    self.hoisted.push(call);
                } else {
                    self.body.push(call);
                }
            }
            None => self.body.push(export_call("default", &text)),
        }
    }

    fn export_all(&mut self, export: &ExportAllDeclaration<'_>) {
        let lines = match &export.exported {
            Some(name) => vec![export_call(name.name().as_str(), SETTER_ARG)],
            None => vec![
                "var __exports = {};".to_string(),
                format!(
                    "for (var __key in {m}) {{ if (__key !== \"default\") __exports[__key] = {m}[__key]; }}",
                    m = SETTER_ARG
                ),
                format!("{}(__exports);", EXPORTS),
            ],
        };
        self.dependency(export.source.value.as_str()).extend(lines);
    }

    fn render(&self) -> String {
        let deps = self
            .deps
            .iter()
            .map(|d| js_string(&d.specifier))
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = format!(
            "System.register([{}], function ({}, {}) {{\n",
            deps, EXPORTS, CONTEXT
        );
        out.push_str("    \"use strict\";\n");
        if !self.bindings.is_empty() {
            out.push_str(&format!("    var {};\n", self.bindings.join(", ")));
        }
        out.push_str(&format!(
            "    var __moduleName = {c} && {c}.id;\n",
            c = CONTEXT
        ));
        out.push_str("    return {\n        setters: [");

        let setters = self
            .deps
            .iter()
            .map(|dep| {
                let mut setter = format!("\n            function ({}) {{\n", SETTER_ARG);
                for line in &dep.setter {
                    setter.push_str(&indent(line, 4));
                }
                setter.push_str("            }");
                setter
            })
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&setters);
        if !self.deps.is_empty() {
            out.push_str("\n        ");
        }
        out.push_str("],\n        execute: function () {\n");

        for chunk in self.hoisted.iter().chain(&self.body).chain(&self.trailing) {
            out.push_str(&indent(chunk, 3));
        }
        out.push_str("        }\n    };\n});\n");
        out
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn member(name: &str) -> String {
    format!("{}[{}]", SETTER_ARG, js_string(name))
}

fn export_call(name: &str, value: &str) -> String {
    format!("{}({}, {});", EXPORTS, js_string(name), value)
}

fn indent(text: &str, level: usize) -> String {
    let pad = "    ".repeat(level);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("{}{}\n", pad, line)
            }
        })
        .collect()
}
