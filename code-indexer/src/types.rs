//! Language-agnostic extraction model.
//!
//! Adapters emit these records; the pipeline turns them into persisted rows.
//! Byte offsets are kept alongside line/column spans so call sites can be
//! attributed to their enclosing declaration.

use ledger_store::model::{SymbolKind, SymbolRange, Visibility};
use serde::{Deserialize, Serialize};

/// A named declaration extracted from one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSymbol {
    pub kind: SymbolKind,
    pub name: String,
    pub range: SymbolRange,
    pub byte_start: usize,
    pub byte_end: usize,
    pub exported: bool,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    pub ast_fingerprint: String,
    /// Declaration head as written in source, trimmed.
    #[serde(default)]
    pub signature: Option<String>,
    /// Leading doc comment, if one is attached.
    #[serde(default)]
    pub doc: Option<String>,
    /// Name chain of enclosing containers, outermost first.
    #[serde(default)]
    pub owner_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl ImportedName {
    /// The identifier the importing file sees.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// One import directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImport {
    pub specifier: String,
    pub is_relative: bool,
    pub is_external: bool,
    pub names: Vec<ImportedName>,
    /// Namespace alias for whole-module imports (`import * as x`, package
    /// aliases), if the language has them.
    #[serde(default)]
    pub namespace_alias: Option<String>,
    pub line: u32,
}

/// Call classification as the adapter saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Function,
    Method,
    Dynamic,
}

/// One call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCall {
    /// Index into the file's extracted symbols; `None` means top-level code.
    pub caller: Option<usize>,
    pub callee: String,
    /// Receiver/namespace text for member calls (`ns.f()` → `ns`).
    #[serde(default)]
    pub receiver: Option<String>,
    pub kind: CallKind,
    pub line: u32,
    pub col: u32,
}

/// Everything extracted from a single parsed file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub symbols: Vec<ExtractedSymbol>,
    pub imports: Vec<ExtractedImport>,
    pub calls: Vec<ExtractedCall>,
}
