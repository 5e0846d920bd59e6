//! JavaScript/JSX adapter. Shares hooks with the TypeScript profile.

use super::typescript;
use crate::adapter::LanguageAdapter;
use crate::languages::LanguageKind;
use crate::languages::profile::*;
use ledger_store::model::SymbolKind;
use std::sync::Arc;

const DECLS: &[DeclRule] = &[
    DeclRule::new(
        &["function_declaration", "generator_function_declaration"],
        SymbolKind::Function,
    ),
    DeclRule::new(&["method_definition"], SymbolKind::Method),
    DeclRule::new(&["class_declaration"], SymbolKind::Class).container(),
    DeclRule::new(&["variable_declarator"], SymbolKind::Variable),
];

pub(crate) fn adapter() -> Arc<dyn LanguageAdapter> {
    Arc::new(ProfileAdapter::new(LanguageProfile {
        language: LanguageKind::JavaScript,
        grammar: || tree_sitter_javascript::LANGUAGE.into(),
        decls: DECLS,
        import_kinds: typescript::IMPORT_KINDS,
        call_kinds: typescript::CALL_KINDS,
        export_hook: typescript::export_hook,
        import_hook: typescript::import_hook,
        call_hook: typescript::call_hook,
        kind_hook: typescript::kind_hook,
    }))
}
