//! Enums shared across the ledger schema.
//!
//! These serialize to snake_case strings that are part of persisted rows and
//! exported artifacts. Avoid renaming existing variants.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Placeholder prefix for call edges whose target could not be bound.
pub const UNRESOLVED_CALL_PREFIX: &str = "unresolved:call:";

/// Kind of a named program entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Variable,
    Module,
    Constructor,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        use SymbolKind::*;
        match self {
            Function => "function",
            Method => "method",
            Class => "class",
            Interface => "interface",
            Type => "type",
            Variable => "variable",
            Module => "module",
            Constructor => "constructor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use SymbolKind::*;
        Some(match s {
            "function" => Function,
            "method" => Method,
            "class" => Class,
            "interface" => Interface,
            "type" => Type,
            "variable" => Variable,
            "module" => Module,
            "constructor" => Constructor,
            _ => return None,
        })
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed relation between symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Import,
    Call,
    Config,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Import => "import",
            EdgeType::Call => "call",
            EdgeType::Config => "config",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "import" => EdgeType::Import,
            "call" => EdgeType::Call,
            "config" => EdgeType::Config,
            _ => return None,
        })
    }
}

impl Display for EdgeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility markers across languages. Not all variants apply to every language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Crate,
    Package,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        use Visibility::*;
        match self {
            Public => "public",
            Private => "private",
            Protected => "protected",
            Crate => "crate",
            Package => "package",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use Visibility::*;
        Some(match s {
            "public" => Public,
            "private" => Private,
            "protected" => Protected,
            "crate" => Crate,
            "package" => Package,
            _ => return None,
        })
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call edge target was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Exact member lookup through a namespace/receiver map.
    Namespace,
    /// Exact match against an imported name.
    Import,
    /// Unique name in the same file.
    SameFile,
    /// Unique name across the whole repository.
    RepoUnique,
    /// Several candidates matched; confidence is split across them.
    Ambiguous,
    /// No candidate matched; the edge points at a placeholder.
    Unresolved,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        use ResolutionStrategy::*;
        match self {
            Namespace => "namespace",
            Import => "import",
            SameFile => "same_file",
            RepoUnique => "repo_unique",
            Ambiguous => "ambiguous",
            Unresolved => "unresolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use ResolutionStrategy::*;
        Some(match s {
            "namespace" => Namespace,
            "import" => Import,
            "same_file" => SameFile,
            "repo_unique" => RepoUnique,
            "ambiguous" => Ambiguous,
            "unresolved" => Unresolved,
            _ => return None,
        })
    }
}

impl Display for ResolutionStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source span of a symbol (line/column, zero-based as tree-sitter reports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SymbolRange {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Type,
            SymbolKind::Variable,
            SymbolKind::Module,
            SymbolKind::Constructor,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("bogus"), None);
    }

    #[test]
    fn strategy_strings_are_stable() {
        assert_eq!(ResolutionStrategy::Import.as_str(), "import");
        assert_eq!(ResolutionStrategy::Namespace.as_str(), "namespace");
        assert_eq!(ResolutionStrategy::Unresolved.as_str(), "unresolved");
    }
}
