//! C adapter. File-static definitions are private; everything else is
//! treated as exported, matching header-driven linkage.

use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::ExtractedImport;
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

pub(crate) const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_definition"], SymbolKind::Function).named(NameRule::Declarator),
    DeclRule::new(&["type_definition"], SymbolKind::Type).named(NameRule::FirstIdentifier),
    DeclRule::new(&["struct_specifier"], SymbolKind::Class).with_body(),
    DeclRule::new(&["enum_specifier"], SymbolKind::Type).with_body(),
];

pub(crate) const IMPORT_KINDS: &[&str] = &["preproc_include"];
pub(crate) const CALL_KINDS: &[&str] = &["call_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::C,
        grammar: || tree_sitter_c::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook,
        import_hook,
        call_hook: default_callee,
        kind_hook: keep_kind,
    }))
}

pub(crate) fn export_hook(
    node: Node<'_>,
    source: &str,
    _name: &str,
) -> (bool, Option<Visibility>) {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if child.kind() == "storage_class_specifier" && text(child, source) == "static" {
            return (false, Some(Visibility::Private));
        }
    }
    (true, Some(Visibility::Public))
}

/// `#include "local.h"` is relative; `#include <system.h>` is external.
pub(crate) fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let Some(path_node) = node.child_by_field_name("path") else {
        return;
    };
    let is_relative = path_node.kind() == "string_literal";
    let specifier = text(path_node, source)
        .trim_matches(|c| c == '"' || c == '<' || c == '>')
        .to_string();
    if specifier.is_empty() {
        return;
    }
    out.push(ExtractedImport {
        specifier,
        is_relative,
        is_external: !is_relative,
        names: Vec::new(),
        namespace_alias: None,
        line: node_line(node),
    });
}
