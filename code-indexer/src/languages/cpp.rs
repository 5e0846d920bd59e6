//! C++ adapter. Extends the C profile with classes, namespaces and
//! constructor detection by class-name match.

use super::c;
use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use ledger_store::model::SymbolKind;
use std::sync::Arc;

const DECLS: &[DeclRule] = &[
    DeclRule::new(&["function_definition"], SymbolKind::Function).named(NameRule::Declarator),
    DeclRule::new(&["type_definition", "alias_declaration"], SymbolKind::Type)
        .named(NameRule::FirstIdentifier),
    DeclRule::new(&["struct_specifier", "class_specifier"], SymbolKind::Class)
        .container()
        .with_body(),
    DeclRule::new(&["enum_specifier"], SymbolKind::Type).with_body(),
    DeclRule::new(&["namespace_definition"], SymbolKind::Module).container(),
];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::Cpp,
        grammar: || tree_sitter_cpp::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: c::IMPORT_KINDS,
        call_kinds: c::CALL_KINDS,
        export_hook: c::export_hook,
        import_hook: c::import_hook,
        call_hook: default_callee,
        kind_hook,
    }))
}

fn kind_hook(name: &str, owner: &[String], kind: SymbolKind) -> SymbolKind {
    if kind == SymbolKind::Method && owner.last().is_some_and(|c| c == name) {
        SymbolKind::Constructor
    } else {
        kind
    }
}
