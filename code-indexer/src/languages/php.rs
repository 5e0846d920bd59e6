//! PHP adapter.

use super::java::modifier_export_hook;
use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{ExtractedImport, ImportedName};
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_definition"], SymbolKind::Function),
    DeclRule::new(&["method_declaration"], SymbolKind::Method),
    DeclRule::new(&["class_declaration", "trait_declaration"], SymbolKind::Class).container(),
    DeclRule::new(&["interface_declaration"], SymbolKind::Interface).container(),
    DeclRule::new(&["enum_declaration"], SymbolKind::Type),
];

const IMPORT_KINDS: &[&str] = &["namespace_use_declaration"];
const CALL_KINDS: &[&str] = &[
    "function_call_expression",
    "member_call_expression",
    "scoped_call_expression",
    "object_creation_expression",
];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Php,
        grammar: || tree_sitter_php::LANGUAGE_PHP.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook,
        import_hook,
        call_hook,
        kind_hook,
    }))
}

fn kind_hook(name: &str, _owner: &[String], kind: SymbolKind) -> SymbolKind {
    if kind == SymbolKind::Method && name == "__construct" {
        SymbolKind::Constructor
    } else {
        kind
    }
}

fn export_hook(node: Node<'_>, source: &str, name: &str) -> (bool, Option<Visibility>) {
    if node.kind() == "method_declaration" {
        return modifier_export_hook(node, source, name);
    }
    (true, Some(Visibility::Public))
}

/// `use A\B\C as D;` — one record per use clause.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "namespace_use_clause" {
            let raw = text(n, source).trim().to_string();
            let (path, alias) = match raw.split_once(" as ") {
                Some((p, a)) => (p.trim().to_string(), Some(a.trim().to_string())),
                None => (raw, None),
            };
            if path.is_empty() {
                continue;
            }
            let leaf = path.rsplit('\\').next().unwrap_or(&path).to_string();
            out.push(ExtractedImport {
                specifier: path,
                is_relative: false,
                is_external: true,
                names: vec![ImportedName { name: leaf, alias }],
                namespace_alias: None,
                line: node_line(n),
            });
            continue;
        }
        for i in (0..n.child_count()).rev() {
            if let Some(c) = n.child(i) {
                stack.push(c);
            }
        }
    }
}

fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    if node.kind() == "object_creation_expression" {
        return first_identifier(node).map(|n| CalleeInfo {
            callee: text(n, source).to_string(),
            receiver: None,
            kind: crate::types::CallKind::Function,
        });
    }
    default_callee(node, source)
}
