//! Java adapter.

use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{CallKind, ExtractedImport, ImportedName};
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["class_declaration"], SymbolKind::Class).container(),
    DeclRule::new(&["interface_declaration"], SymbolKind::Interface).container(),
    DeclRule::new(&["enum_declaration"], SymbolKind::Type).container(),
    DeclRule::new(&["record_declaration"], SymbolKind::Class).container(),
    DeclRule::new(&["method_declaration"], SymbolKind::Method),
    DeclRule::new(&["constructor_declaration"], SymbolKind::Constructor),
];

const IMPORT_KINDS: &[&str] = &["import_declaration"];
const CALL_KINDS: &[&str] = &["method_invocation", "object_creation_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Java,
        grammar: || tree_sitter_java::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook: modifier_export_hook,
        import_hook,
        call_hook,
        kind_hook: keep_kind,
    }))
}

/// Shared by the modifier-keyword languages (Java, C#, Kotlin, PHP members).
pub(crate) fn modifier_export_hook(
    node: Node<'_>,
    source: &str,
    _name: &str,
) -> (bool, Option<Visibility>) {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if !child.kind().contains("modifier") {
            continue;
        }
        let modifiers = text(child, source);
        if modifiers.split_whitespace().any(|m| m == "public") {
            return (true, Some(Visibility::Public));
        }
        if modifiers.split_whitespace().any(|m| m == "private") {
            return (false, Some(Visibility::Private));
        }
        if modifiers.split_whitespace().any(|m| m == "protected") {
            return (false, Some(Visibility::Protected));
        }
    }
    (false, Some(Visibility::Package))
}

/// `import a.b.C;` — the class simple name is what call sites use.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let raw = text(node, source)
        .trim_start_matches("import")
        .trim()
        .trim_start_matches("static")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();
    if raw.is_empty() {
        return;
    }
    let leaf = raw.rsplit('.').next().unwrap_or(&raw).to_string();
    let names = if leaf == "*" {
        Vec::new()
    } else {
        vec![ImportedName {
            name: leaf,
            alias: None,
        }]
    };
    out.push(ExtractedImport {
        specifier: raw,
        is_relative: false,
        is_external: true,
        names,
        namespace_alias: None,
        line: node_line(node),
    });
}

fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    match node.kind() {
        "object_creation_expression" => {
            let ty = node.child_by_field_name("type")?;
            Some(CalleeInfo {
                callee: text(ty, source).to_string(),
                receiver: None,
                kind: CallKind::Function,
            })
        }
        _ => {
            let name = node.child_by_field_name("name")?;
            let receiver = node
                .child_by_field_name("object")
                .filter(|o| is_identifier_kind(o.kind()))
                .map(|o| text(o, source).to_string());
            let kind = if node.child_by_field_name("object").is_some() {
                CallKind::Method
            } else {
                CallKind::Function
            };
            Some(CalleeInfo {
                callee: text(name, source).to_string(),
                receiver,
                kind,
            })
        }
    }
}
