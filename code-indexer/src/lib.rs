//! Multi-language indexing engine.
//!
//! Parses source files with tree-sitter grammar adapters, extracts symbols,
//! imports and calls, assigns content-addressed identifiers, and writes a
//! new ledger version through `ledger-store`.

pub mod adapter;
pub mod errors;
pub mod fingerprint;
pub mod ids;
pub mod languages;
pub mod pipeline;
pub mod resolve;
pub mod scan;
pub mod types;

pub use adapter::{AdapterRegistry, LanguageAdapter, ResolveCtx, ResolvedCall};
pub use errors::{Error, Result};
pub use languages::{LanguageKind, detect_language};
pub use pipeline::{
    IndexMode, IndexOptions, IndexProgress, IndexStats, ProgressFn, RepoSpec, index_repo,
};
pub use scan::{ScanFilters, ScannedFile, scan_repo};

#[cfg(test)]
mod adapter_tests {
    use crate::adapter::AdapterRegistry;
    use crate::languages::LanguageKind;
    use crate::types::CallKind;
    use ledger_store::model::SymbolKind;

    fn extract(language: LanguageKind, source: &str) -> crate::types::FileExtraction {
        let registry = AdapterRegistry::with_builtins();
        let adapter = registry.adapter_for(language).expect("built-in adapter");
        let tree = adapter.parse(source).expect("parse tree");
        let symbols = adapter.extract_symbols(&tree, source, "fixture");
        let imports = adapter.extract_imports(&tree, source, "fixture");
        let calls = adapter.extract_calls(&tree, source, "fixture", &symbols);
        crate::types::FileExtraction {
            symbols,
            imports,
            calls,
        }
    }

    #[test]
    fn typescript_exported_function_and_named_import() {
        let src = r#"
import { helper as h, other } from './util';
import * as ns from './ns';

export function add(a: number, b: number): number {
    return h(a) + other(b) + ns.mul(a, b);
}

function local() {}
"#;
        let fx = extract(LanguageKind::TypeScript, src);

        let add = fx.symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.kind, SymbolKind::Function);
        assert!(add.exported);
        let local = fx.symbols.iter().find(|s| s.name == "local").unwrap();
        assert!(!local.exported);

        assert_eq!(fx.imports.len(), 2);
        let util = &fx.imports[0];
        assert_eq!(util.specifier, "./util");
        assert!(util.is_relative);
        let locals: Vec<&str> = util.names.iter().map(|n| n.local_name()).collect();
        assert_eq!(locals, vec!["h", "other"]);
        assert_eq!(fx.imports[1].namespace_alias.as_deref(), Some("ns"));

        let ns_call = fx.calls.iter().find(|c| c.callee == "mul").unwrap();
        assert_eq!(ns_call.receiver.as_deref(), Some("ns"));
        assert_eq!(ns_call.kind, CallKind::Method);
        // All three calls happen inside `add`.
        let add_idx = fx.symbols.iter().position(|s| s.name == "add").unwrap();
        assert!(fx.calls.iter().all(|c| c.caller == Some(add_idx)));
    }

    #[test]
    fn typescript_class_members_and_constructor() {
        let src = r#"
export class Parser {
    constructor(input: string) {}
    parse(): void { this.step(); }
    private step(): void {}
}
"#;
        let fx = extract(LanguageKind::TypeScript, src);
        let ctor = fx.symbols.iter().find(|s| s.name == "constructor").unwrap();
        assert_eq!(ctor.kind, SymbolKind::Constructor);
        let step = fx.symbols.iter().find(|s| s.name == "step").unwrap();
        assert_eq!(step.kind, SymbolKind::Method);
        assert!(!step.exported);
        assert_eq!(step.owner_path, vec!["Parser".to_string()]);
    }

    #[test]
    fn python_underscore_visibility_and_from_import() {
        let src = r#"
from pkg.mod import thing, renamed as r
import os.path as osp

class Walker:
    def __init__(self):
        self._depth = 0

    def walk(self):
        thing()
        self._descend()

    def _descend(self):
        pass
"#;
        let fx = extract(LanguageKind::Python, src);

        let walker = fx.symbols.iter().find(|s| s.name == "Walker").unwrap();
        assert!(walker.exported);
        let init = fx.symbols.iter().find(|s| s.name == "__init__").unwrap();
        assert_eq!(init.kind, SymbolKind::Constructor);
        let descend = fx.symbols.iter().find(|s| s.name == "_descend").unwrap();
        assert!(!descend.exported);

        let from_import = &fx.imports[0];
        assert_eq!(from_import.specifier, "pkg.mod");
        assert_eq!(from_import.names.len(), 2);
        assert_eq!(from_import.names[1].local_name(), "r");
        assert_eq!(fx.imports[1].namespace_alias.as_deref(), Some("osp"));

        assert!(fx.calls.iter().any(|c| c.callee == "thing"));
        assert!(
            fx.calls
                .iter()
                .any(|c| c.callee == "_descend" && c.receiver.as_deref() == Some("self"))
        );
    }

    #[test]
    fn rust_visibility_and_use_tree() {
        let src = r#"
use crate::store::{Store, open as open_store};

pub struct Ledger {
    inner: Store,
}

impl Ledger {
    pub fn open(path: &str) -> Self {
        let inner = open_store(path);
        Self { inner }
    }

    fn internal(&self) {}
}

pub(crate) fn helper() {}
"#;
        let fx = extract(LanguageKind::Rust, src);

        let ledger = fx.symbols.iter().find(|s| s.name == "Ledger").unwrap();
        assert_eq!(ledger.kind, SymbolKind::Class);
        assert!(ledger.exported);

        let open = fx.symbols.iter().find(|s| s.name == "open").unwrap();
        assert_eq!(open.kind, SymbolKind::Method);
        assert_eq!(open.owner_path, vec!["Ledger".to_string()]);

        let helper = fx.symbols.iter().find(|s| s.name == "helper").unwrap();
        assert!(!helper.exported);

        let import = &fx.imports[0];
        assert!(import.is_relative);
        let names: Vec<&str> = import.names.iter().map(|n| n.local_name()).collect();
        assert!(names.contains(&"Store"));
        assert!(names.contains(&"open_store"));
    }

    #[test]
    fn go_uppercase_export_rule() {
        let src = r#"
package ledger

import rq "example.com/pkg/req"

func Exported() int {
    return helper() + rq.Get()
}

func helper() int { return 1 }
"#;
        let fx = extract(LanguageKind::Go, src);
        let exported = fx.symbols.iter().find(|s| s.name == "Exported").unwrap();
        assert!(exported.exported);
        let helper = fx.symbols.iter().find(|s| s.name == "helper").unwrap();
        assert!(!helper.exported);

        assert_eq!(fx.imports[0].namespace_alias.as_deref(), Some("rq"));
        assert!(
            fx.calls
                .iter()
                .any(|c| c.callee == "Get" && c.receiver.as_deref() == Some("rq"))
        );
    }

    #[test]
    fn java_modifiers_and_method_invocations() {
        let src = r#"
import java.util.List;

public class Service {
    public Service() {}

    public void run() {
        step();
        logger.info("x");
    }

    private void step() {}
}
"#;
        let fx = extract(LanguageKind::Java, src);
        let service = fx.symbols.iter().find(|s| s.name == "Service" && s.kind == SymbolKind::Class).unwrap();
        assert!(service.exported);
        let ctor = fx
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Constructor)
            .unwrap();
        assert_eq!(ctor.name, "Service");
        let step = fx.symbols.iter().find(|s| s.name == "step").unwrap();
        assert!(!step.exported);

        assert_eq!(fx.imports[0].names[0].name, "List");
        assert!(fx.calls.iter().any(|c| c.callee == "step"));
        assert!(
            fx.calls
                .iter()
                .any(|c| c.callee == "info" && c.receiver.as_deref() == Some("logger"))
        );
    }

    #[test]
    fn c_static_functions_are_private() {
        let src = r#"
#include "local.h"
#include <stdio.h>

static int hidden(int x) { return x; }

int visible(int x) {
    return hidden(x);
}
"#;
        let fx = extract(LanguageKind::C, src);
        let hidden = fx.symbols.iter().find(|s| s.name == "hidden").unwrap();
        assert!(!hidden.exported);
        let visible = fx.symbols.iter().find(|s| s.name == "visible").unwrap();
        assert!(visible.exported);

        assert!(fx.imports[0].is_relative);
        assert!(!fx.imports[1].is_relative);
        assert!(fx.calls.iter().any(|c| c.callee == "hidden"));
    }

    #[test]
    fn shell_functions_and_source_imports() {
        let src = r#"
source lib.sh

greet() {
    helper "$1"
}

greet world
"#;
        let fx = extract(LanguageKind::Shell, src);
        assert!(fx.symbols.iter().any(|s| s.name == "greet"));
        assert_eq!(fx.imports[0].specifier, "lib.sh");
        assert!(fx.calls.iter().any(|c| c.callee == "helper"));
        assert!(fx.calls.iter().any(|c| c.callee == "greet"));
    }

    #[test]
    fn extraction_is_deterministic_across_runs() {
        let src = r#"
import { a } from './a';
export function f(x: number) { return a(x); }
export class C { m() { f(1); } }
"#;
        let first = extract(LanguageKind::TypeScript, src);
        let second = extract(LanguageKind::TypeScript, src);
        let fp1: Vec<&str> = first.symbols.iter().map(|s| s.ast_fingerprint.as_str()).collect();
        let fp2: Vec<&str> = second.symbols.iter().map(|s| s.ast_fingerprint.as_str()).collect();
        assert_eq!(fp1, fp2);
        assert_eq!(
            serde_json::to_string(&first.symbols).unwrap(),
            serde_json::to_string(&second.symbols).unwrap()
        );
    }

    #[test]
    fn fingerprint_is_stable_over_comments_and_literals() {
        let a = "export function f(x: number) { return x + 1; }";
        let b = "export function f(x: number) { /* note */ return x + 2; }";
        let fa = extract(LanguageKind::TypeScript, a);
        let fb = extract(LanguageKind::TypeScript, b);
        assert_eq!(
            fa.symbols[0].ast_fingerprint,
            fb.symbols[0].ast_fingerprint
        );

        // Structure changes do move the fingerprint.
        let c = "export function f(x: number, y: number) { return x; }";
        let fc = extract(LanguageKind::TypeScript, c);
        assert_ne!(
            fa.symbols[0].ast_fingerprint,
            fc.symbols[0].ast_fingerprint
        );
    }
}
