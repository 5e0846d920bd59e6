//! C# adapter.

use super::java::modifier_export_hook;
use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::ExtractedImport;
use ledger_store::model::SymbolKind;
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(
        &["class_declaration", "struct_declaration", "record_declaration"],
        SymbolKind::Class,
    )
    .container(),
    DeclRule::new(&["interface_declaration"], SymbolKind::Interface).container(),
    DeclRule::new(&["enum_declaration"], SymbolKind::Type),
    DeclRule::new(&["method_declaration"], SymbolKind::Method),
    DeclRule::new(&["constructor_declaration"], SymbolKind::Constructor),
    DeclRule::new(&["property_declaration"], SymbolKind::Variable),
    DeclRule::new(
        &["namespace_declaration", "file_scoped_namespace_declaration"],
        SymbolKind::Module,
    )
    .container(),
];

const IMPORT_KINDS: &[&str] = &["using_directive"];
const CALL_KINDS: &[&str] = &["invocation_expression", "object_creation_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::CSharp,
        grammar: || tree_sitter_c_sharp::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook: modifier_export_hook,
        import_hook,
        call_hook,
        kind_hook: keep_kind,
    }))
}

fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let raw = text(node, source)
        .trim_start_matches("global")
        .trim()
        .trim_start_matches("using")
        .trim()
        .trim_start_matches("static")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();
    if raw.is_empty() {
        return;
    }
    let tail = raw.rsplit('.').next().unwrap_or(&raw).to_string();
    out.push(ExtractedImport {
        specifier: raw,
        is_relative: false,
        is_external: true,
        names: Vec::new(),
        namespace_alias: Some(tail),
        line: node_line(node),
    });
}

fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    if node.kind() == "object_creation_expression" {
        let ty = node.child_by_field_name("type")?;
        return Some(CalleeInfo {
            callee: text(ty, source).to_string(),
            receiver: None,
            kind: crate::types::CallKind::Function,
        });
    }
    default_callee(node, source)
}
