//! Kotlin adapter.
//!
//! The kotlin grammar does not field-name declaration identifiers uniformly,
//! so names come from the first identifier-like descendant.

use super::java::modifier_export_hook;
use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{CallKind, ExtractedImport, ImportedName};
use ledger_store::model::SymbolKind;
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_declaration"], SymbolKind::Function)
        .named(NameRule::FirstIdentifier),
    DeclRule::new(&["class_declaration", "object_declaration"], SymbolKind::Class)
        .named(NameRule::FirstIdentifier)
        .container(),
    DeclRule::new(&["property_declaration"], SymbolKind::Variable)
        .named(NameRule::FirstIdentifier),
];

const IMPORT_KINDS: &[&str] = &["import_header"];
const CALL_KINDS: &[&str] = &["call_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Kotlin,
        grammar: || tree_sitter_kotlin_ng::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook: modifier_export_hook,
        import_hook,
        call_hook,
        kind_hook: keep_kind,
    }))
}

/// `import a.b.C as D`.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let raw = text(node, source)
        .trim_start_matches("import")
        .trim()
        .to_string();
    if raw.is_empty() {
        return;
    }
    let (path, alias) = match raw.split_once(" as ") {
        Some((p, a)) => (p.trim().to_string(), Some(a.trim().to_string())),
        None => (raw, None),
    };
    let leaf = path.rsplit('.').next().unwrap_or(&path).to_string();
    let names = if leaf == "*" {
        Vec::new()
    } else {
        vec![ImportedName { name: leaf, alias }]
    };
    out.push(ExtractedImport {
        specifier: path,
        is_relative: false,
        is_external: true,
        names,
        namespace_alias: None,
        line: node_line(node),
    });
}

/// `f(...)`, `obj.f(...)` — the callee is the identifier immediately before
/// the argument list, the receiver the head of a navigation chain.
fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    let head = node.child(0)?;
    if is_identifier_kind(head.kind()) {
        return Some(CalleeInfo {
            callee: text(head, source).to_string(),
            receiver: None,
            kind: CallKind::Function,
        });
    }
    if head.kind() == "navigation_expression" {
        let mut idents = Vec::new();
        let mut stack = vec![head];
        while let Some(n) = stack.pop() {
            if is_identifier_kind(n.kind()) {
                idents.push(text(n, source).to_string());
            }
            for i in (0..n.child_count()).rev() {
                if let Some(c) = n.child(i) {
                    stack.push(c);
                }
            }
        }
        // Depth-first left-to-right: first is the receiver head, last the member.
        let callee = idents.last()?.clone();
        let receiver = if idents.len() > 1 {
            Some(idents[0].clone())
        } else {
            None
        };
        return Some(CalleeInfo {
            callee,
            receiver,
            kind: CallKind::Method,
        });
    }
    callee_from(head, source)
}
