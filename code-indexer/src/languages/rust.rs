//! Rust adapter.
//!
//! `impl` blocks are anonymous containers: their methods are owned by the
//! implemented type without the block itself becoming a symbol.

use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{ExtractedImport, ImportedName};
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_item"], SymbolKind::Function),
    DeclRule::new(&["struct_item", "union_item"], SymbolKind::Class),
    DeclRule::new(&["enum_item", "type_item"], SymbolKind::Type),
    DeclRule::new(&["trait_item"], SymbolKind::Interface).container(),
    DeclRule::new(&["mod_item"], SymbolKind::Module).container(),
    DeclRule::new(&["const_item", "static_item"], SymbolKind::Variable),
    DeclRule::new(&["impl_item"], SymbolKind::Class)
        .container()
        .anonymous(),
];

const IMPORT_KINDS: &[&str] = &["use_declaration"];
const CALL_KINDS: &[&str] = &["call_expression"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Rust,
        grammar: || tree_sitter_rust::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook,
        import_hook,
        call_hook,
        kind_hook: keep_kind,
    }))
}

fn export_hook(node: Node<'_>, source: &str, _name: &str) -> (bool, Option<Visibility>) {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if child.kind() == "visibility_modifier" {
            let vis = text(child, source);
            return if vis == "pub" {
                (true, Some(Visibility::Public))
            } else {
                // pub(crate), pub(super), pub(in ...)
                (false, Some(Visibility::Crate))
            };
        }
    }
    (false, Some(Visibility::Private))
}

/// `use a::b::{c, d as e};` — one record per imported leaf.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let Some(argument) = node.child_by_field_name("argument") else {
        return;
    };
    let full = text(argument, source).to_string();
    let is_relative = full.starts_with("crate")
        || full.starts_with("self")
        || full.starts_with("super");

    let mut names = Vec::new();
    collect_use_names(argument, source, &mut names);

    let specifier = match full.split_once("::{") {
        Some((prefix, _)) => prefix.to_string(),
        None => full.clone(),
    };

    out.push(ExtractedImport {
        specifier,
        is_relative,
        is_external: !is_relative,
        names,
        namespace_alias: None,
        line: node_line(node),
    });
}

fn collect_use_names(node: Node<'_>, source: &str, out: &mut Vec<ImportedName>) {
    match node.kind() {
        "identifier" => out.push(ImportedName {
            name: text(node, source).to_string(),
            alias: None,
        }),
        "scoped_identifier" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.push(ImportedName {
                    name: text(name, source).to_string(),
                    alias: None,
                });
            }
        }
        "use_as_clause" => {
            let original = node
                .child_by_field_name("path")
                .map(|n| text(n, source))
                .unwrap_or_default();
            let alias = node
                .child_by_field_name("alias")
                .map(|n| text(n, source).to_string());
            let leaf = original.rsplit("::").next().unwrap_or(original);
            if !leaf.is_empty() {
                out.push(ImportedName {
                    name: leaf.to_string(),
                    alias,
                });
            }
        }
        "scoped_use_list" => {
            // Only the braced list names imports; the path prefix does not.
            if let Some(list) = node.child_by_field_name("list") {
                collect_use_names(list, source, out);
            }
        }
        "use_list" => {
            for i in 0..node.named_child_count() {
                if let Some(child) = node.named_child(i) {
                    collect_use_names(child, source, out);
                }
            }
        }
        _ => {}
    }
}

/// `foo()`, `path::foo()` and `x.foo()`.
fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "scoped_identifier" => {
            let name = function.child_by_field_name("name")?;
            let receiver = function
                .child_by_field_name("path")
                .filter(|p| is_identifier_kind(p.kind()))
                .map(|p| text(p, source).to_string());
            Some(CalleeInfo {
                callee: text(name, source).to_string(),
                receiver,
                kind: crate::types::CallKind::Method,
            })
        }
        _ => callee_from(function, source),
    }
}
