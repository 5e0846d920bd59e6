//! TypeScript/TSX adapter.
//!
//! Also carries the namespace-aware call resolver used as the exemplar for
//! adapter-provided resolution; other built-ins defer to the generic
//! resolver in the indexer.

use crate::adapter::{LanguageAdapter, ResolveCtx, ResolvedCall};
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{CallKind, ExtractedCall, ExtractedImport, ExtractedSymbol, ImportedName};
use ledger_store::model::{ResolutionStrategy, SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::{Node, Tree};

pub(crate) const DECLS: &[DeclRule] = &[
    DeclRule::new(
        &["function_declaration", "generator_function_declaration"],
        SymbolKind::Function,
    ),
    DeclRule::new(&["method_definition"], SymbolKind::Method),
    DeclRule::new(
        &["class_declaration", "abstract_class_declaration"],
        SymbolKind::Class,
    )
    .container(),
    DeclRule::new(&["interface_declaration"], SymbolKind::Interface).container(),
    DeclRule::new(&["type_alias_declaration"], SymbolKind::Type),
    DeclRule::new(&["enum_declaration"], SymbolKind::Type),
    DeclRule::new(&["internal_module"], SymbolKind::Module).container(),
    DeclRule::new(&["variable_declarator"], SymbolKind::Variable),
];

pub(crate) const IMPORT_KINDS: &[&str] = &["import_statement"];
pub(crate) const CALL_KINDS: &[&str] = &["call_expression", "new_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(TsAdapter {
        inner: ProfileAdapter::new(LanguageProfile {
            language: LanguageKind::TypeScript,
            grammar: || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            decls: DECLS,
            import_kinds: IMPORT_KINDS,
            call_kinds: CALL_KINDS,
            export_hook,
            import_hook,
            call_hook,
            kind_hook,
        }),
    })
}

/// Profile adapter plus the namespace-member resolver.
struct TsAdapter {
    inner: ProfileAdapter,
}

impl LanguageAdapter for TsAdapter {
    fn language(&self) -> LanguageKind {
        self.inner.language()
    }

    fn parse(&self, source: &str) -> Option<Tree> {
        self.inner.parse(source)
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, rel_path: &str) -> Vec<ExtractedSymbol> {
        self.inner.extract_symbols(tree, source, rel_path)
    }

    fn extract_imports(&self, tree: &Tree, source: &str, rel_path: &str) -> Vec<ExtractedImport> {
        self.inner.extract_imports(tree, source, rel_path)
    }

    fn extract_calls(
        &self,
        tree: &Tree,
        source: &str,
        rel_path: &str,
        symbols: &[ExtractedSymbol],
    ) -> Vec<ExtractedCall> {
        self.inner.extract_calls(tree, source, rel_path, symbols)
    }

    /// Bind `ns.member()` through the namespace map, then plain names through
    /// the imported-name map. Anything else falls back to the generic path.
    fn resolve_call(&self, call: &ExtractedCall, ctx: &ResolveCtx<'_>) -> Option<ResolvedCall> {
        if let Some(receiver) = &call.receiver {
            if let Some(members) = ctx.namespaces.get(receiver) {
                if let Some(id) = members.get(&call.callee) {
                    return Some(ResolvedCall {
                        symbol_id: id.clone(),
                        confidence: 1.0,
                        strategy: ResolutionStrategy::Namespace,
                        candidates: 1,
                    });
                }
            }
        }
        if call.kind == CallKind::Function {
            if let Some(ids) = ctx.imported.get(&call.callee) {
                if ids.len() == 1 {
                    return Some(ResolvedCall {
                        symbol_id: ids[0].clone(),
                        confidence: 1.0,
                        strategy: ResolutionStrategy::Import,
                        candidates: 1,
                    });
                }
            }
        }
        None
    }
}

pub(crate) fn kind_hook(name: &str, _owner: &[String], kind: SymbolKind) -> SymbolKind {
    if kind == SymbolKind::Method && name == "constructor" {
        SymbolKind::Constructor
    } else {
        kind
    }
}

/// Exported when wrapped (at any depth up to the module head) in an
/// `export_statement`. Class members get their accessibility modifier.
pub(crate) fn export_hook(
    node: Node<'_>,
    source: &str,
    name: &str,
) -> (bool, Option<Visibility>) {
    if name.starts_with('#') {
        return (false, Some(Visibility::Private));
    }
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if child.kind() == "accessibility_modifier" {
            return match text(child, source) {
                "private" => (false, Some(Visibility::Private)),
                "protected" => (false, Some(Visibility::Protected)),
                _ => (false, Some(Visibility::Public)),
            };
        }
    }
    let mut current = node;
    for _ in 0..4 {
        match current.parent() {
            Some(p) if p.kind() == "export_statement" => return (true, Some(Visibility::Public)),
            Some(p) => current = p,
            None => break,
        }
    }
    (false, None)
}

/// `import d, { a as b } from './x'` and `import * as ns from './x'`.
pub(crate) fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let specifier = unquote(text(source_node, source));
    let is_relative = specifier.starts_with('.');

    let mut names = Vec::new();
    let mut namespace_alias = None;

    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        match n.kind() {
            "import_specifier" => {
                let name = n
                    .child_by_field_name("name")
                    .map(|c| text(c, source).to_string())
                    .unwrap_or_default();
                let alias = n
                    .child_by_field_name("alias")
                    .map(|c| text(c, source).to_string());
                if !name.is_empty() {
                    names.push(ImportedName { name, alias });
                }
                continue;
            }
            "namespace_import" => {
                namespace_alias = first_identifier(n).map(|c| text(c, source).to_string());
                continue;
            }
            "import_clause" => {
                // A bare identifier child is the default import.
                for i in 0..n.child_count() {
                    if let Some(c) = n.child(i) {
                        if c.kind() == "identifier" {
                            names.push(ImportedName {
                                name: "default".to_string(),
                                alias: Some(text(c, source).to_string()),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
        for i in (0..n.child_count()).rev() {
            if let Some(c) = n.child(i) {
                stack.push(c);
            }
        }
    }

    out.push(ExtractedImport {
        specifier,
        is_relative,
        is_external: !is_relative,
        names,
        namespace_alias,
        line: node_line(node),
    });
}

pub(crate) fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    default_callee(node, source)
}
