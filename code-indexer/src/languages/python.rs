//! Python adapter.
//!
//! Visibility follows the underscore convention; `__init__` is surfaced as a
//! constructor.

use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{ExtractedImport, ImportedName};
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_definition"], SymbolKind::Function),
    DeclRule::new(&["class_definition"], SymbolKind::Class).container(),
];

const IMPORT_KINDS: &[&str] = &["import_statement", "import_from_statement"];
const CALL_KINDS: &[&str] = &["call"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Python,
        grammar: || tree_sitter_python::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook,
        import_hook,
        call_hook: default_callee,
        kind_hook,
    }))
}

fn kind_hook(name: &str, _owner: &[String], kind: SymbolKind) -> SymbolKind {
    if kind == SymbolKind::Method && name == "__init__" {
        SymbolKind::Constructor
    } else {
        kind
    }
}

fn export_hook(_node: Node<'_>, _source: &str, name: &str) -> (bool, Option<Visibility>) {
    if name.starts_with('_') {
        (false, Some(Visibility::Private))
    } else {
        (true, Some(Visibility::Public))
    }
}

/// `import a.b as c` and `from .mod import x as y, z`.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    match node.kind() {
        "import_statement" => {
            for i in 0..node.named_child_count() {
                let Some(child) = node.named_child(i) else { continue };
                let (module, alias) = match child.kind() {
                    "dotted_name" => (text(child, source).to_string(), None),
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| text(n, source).to_string())
                            .unwrap_or_default();
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| text(n, source).to_string());
                        (name, alias)
                    }
                    _ => continue,
                };
                if module.is_empty() {
                    continue;
                }
                let last = module.rsplit('.').next().unwrap_or(&module).to_string();
                out.push(ExtractedImport {
                    specifier: module,
                    is_relative: false,
                    is_external: true,
                    names: Vec::new(),
                    namespace_alias: Some(alias.unwrap_or(last)),
                    line: node_line(node),
                });
            }
        }
        "import_from_statement" => {
            let Some(module_node) = node.child_by_field_name("module_name") else {
                return;
            };
            let specifier = text(module_node, source).to_string();
            let is_relative = specifier.starts_with('.');

            let mut names = Vec::new();
            for i in 0..node.named_child_count() {
                let Some(child) = node.named_child(i) else { continue };
                if child.id() == module_node.id() {
                    continue;
                }
                match child.kind() {
                    "dotted_name" => names.push(ImportedName {
                        name: text(child, source).to_string(),
                        alias: None,
                    }),
                    "aliased_import" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| text(n, source).to_string())
                            .unwrap_or_default();
                        let alias = child
                            .child_by_field_name("alias")
                            .map(|n| text(n, source).to_string());
                        if !name.is_empty() {
                            names.push(ImportedName { name, alias });
                        }
                    }
                    "wildcard_import" => {}
                    _ => {}
                }
            }
            out.push(ExtractedImport {
                specifier: specifier.trim_start_matches('.').to_string(),
                is_relative,
                is_external: !is_relative,
                names,
                namespace_alias: None,
                line: node_line(node),
            });
        }
        _ => {}
    }
}
