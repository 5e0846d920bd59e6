//! Go adapter. Export follows the uppercase-initial rule.

use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::ExtractedImport;
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_declaration"], SymbolKind::Function),
    DeclRule::new(&["method_declaration"], SymbolKind::Method),
    DeclRule::new(&["type_spec"], SymbolKind::Type),
    DeclRule::new(&["const_spec", "var_spec"], SymbolKind::Variable),
];

const IMPORT_KINDS: &[&str] = &["import_spec"];
const CALL_KINDS: &[&str] = &["call_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Go,
        grammar: || tree_sitter_go::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook,
        import_hook,
        call_hook: default_callee,
        kind_hook: keep_kind,
    }))
}

fn export_hook(_node: Node<'_>, _source: &str, name: &str) -> (bool, Option<Visibility>) {
    let exported = name.chars().next().is_some_and(|c| c.is_uppercase());
    if exported {
        (true, Some(Visibility::Public))
    } else {
        (false, Some(Visibility::Package))
    }
}

/// `import alias "path/to/pkg"` — the package tail (or alias) becomes the
/// namespace through which members are reached.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let Some(path_node) = node.child_by_field_name("path") else {
        return;
    };
    let specifier = unquote(text(path_node, source));
    let alias = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string());
    let tail = specifier
        .rsplit('/')
        .next()
        .unwrap_or(specifier.as_str())
        .to_string();
    let is_relative = specifier.starts_with("./") || specifier.starts_with("../");
    out.push(ExtractedImport {
        specifier,
        is_relative,
        is_external: !is_relative,
        names: Vec::new(),
        namespace_alias: Some(alias.unwrap_or(tail)),
        line: node_line(node),
    });
}
