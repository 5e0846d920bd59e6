//! Shell adapter.
//!
//! Function definitions become symbols; commands with identifier-shaped
//! names become calls (the resolver decides which of them bind to local
//! functions). `source`/`.` commands are surfaced as imports instead.

use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use crate::types::{CallKind, ExtractedImport};
use ledger_store::model::{SymbolKind, Visibility};
use std::sync::Arc;
use tree_sitter::Node;

const DECLS: &[DeclRule] = &[DeclRule::new(&["function_definition"], SymbolKind::Function)];

const IMPORT_KINDS: &[&str] = &["command"];
const CALL_KINDS: &[&str] = &["command"];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Shell,
        grammar: || tree_sitter_bash::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: IMPORT_KINDS,
        call_kinds: CALL_KINDS,
        export_hook,
        import_hook,
        call_hook,
        kind_hook: keep_kind,
    }))
}

fn export_hook(_node: Node<'_>, _source: &str, _name: &str) -> (bool, Option<Visibility>) {
    (true, Some(Visibility::Public))
}

fn command_name<'a>(node: Node<'a>, source: &'a str) -> Option<&'a str> {
    let name = node.child_by_field_name("name")?;
    Some(text(name, source))
}

fn first_argument(node: Node<'_>, source: &str) -> Option<String> {
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else { continue };
        if child.kind() == "word" || child.kind() == "string" || child.kind() == "raw_string" {
            let arg = unquote(text(child, source));
            if !arg.is_empty() {
                return Some(arg);
            }
        }
    }
    None
}

/// `source lib.sh` / `. lib.sh`.
fn import_hook(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>) {
    let Some(name) = command_name(node, source) else {
        return;
    };
    if name != "source" && name != "." {
        return;
    }
    let Some(target) = first_argument(node, source) else {
        return;
    };
    out.push(ExtractedImport {
        specifier: target,
        is_relative: true,
        is_external: false,
        names: Vec::new(),
        namespace_alias: None,
        line: node_line(node),
    });
}

fn call_hook(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    let name = command_name(node, source)?;
    if name == "source" || name == "." {
        return None;
    }
    let identifier_shaped = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if !identifier_shaped {
        return None;
    }
    Some(CalleeInfo {
        callee: name.to_string(),
        receiver: None,
        kind: CallKind::Function,
    })
}
