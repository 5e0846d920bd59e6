//! Adapter contract and the process-wide registry.
//!
//! An adapter bundles a grammar with four extraction operations and an
//! optional call resolver. The registry maps file extensions to adapters,
//! constructing each lazily on first use; plugins may override a built-in,
//! which is allowed but logged.

use crate::languages::{self, LanguageKind};
use crate::types::{ExtractedCall, ExtractedImport, ExtractedSymbol};
use ledger_store::model::ResolutionStrategy;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use tree_sitter::Tree;

/// Lookup maps the indexer hands to adapter resolvers.
pub struct ResolveCtx<'a> {
    /// Locally imported name → candidate symbol IDs.
    pub imported: &'a HashMap<String, Vec<String>>,
    /// Namespace/receiver name → member name → symbol ID.
    pub namespaces: &'a HashMap<String, BTreeMap<String, String>>,
    /// Name → symbol IDs declared in the same file.
    pub same_file: &'a HashMap<String, Vec<String>>,
    /// Name → symbol IDs repo-wide.
    pub repo_names: &'a HashMap<String, Vec<String>>,
}

/// A bound call target with its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub symbol_id: String,
    pub confidence: f64,
    pub strategy: ResolutionStrategy,
    pub candidates: usize,
}

pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> LanguageKind;

    /// Parse source bytes. `None` means the parser could not open a tree at
    /// all; partial trees with error nodes are acceptable extractor input.
    fn parse(&self, source: &str) -> Option<Tree>;

    /// Ordered declarations of one file. Malformed nodes are skipped.
    fn extract_symbols(&self, tree: &Tree, source: &str, rel_path: &str) -> Vec<ExtractedSymbol>;

    fn extract_imports(&self, tree: &Tree, source: &str, rel_path: &str) -> Vec<ExtractedImport>;

    fn extract_calls(
        &self,
        tree: &Tree,
        source: &str,
        rel_path: &str,
        symbols: &[ExtractedSymbol],
    ) -> Vec<ExtractedCall>;

    /// Language-specific call resolution. `None` falls back to the generic
    /// resolver in the indexer.
    fn resolve_call(&self, _call: &ExtractedCall, _ctx: &ResolveCtx<'_>) -> Option<ResolvedCall> {
        None
    }
}

type AdapterFactory = Box<dyn Fn() -> Arc<dyn LanguageAdapter> + Send + Sync>;

/// Extension → adapter lookup with lazy construction.
pub struct AdapterRegistry {
    factories: HashMap<LanguageKind, AdapterFactory>,
    constructed: RwLock<HashMap<LanguageKind, Arc<dyn LanguageAdapter>>>,
}

impl AdapterRegistry {
    /// Registry with all built-in languages wired.
    pub fn with_builtins() -> Self {
        use crate::languages::*;
        let mut registry = Self {
            factories: HashMap::new(),
            constructed: RwLock::new(HashMap::new()),
        };
        registry.install(LanguageKind::TypeScript, || typescript::adapter());
        registry.install(LanguageKind::JavaScript, || javascript::adapter());
        registry.install(LanguageKind::Python, || python::adapter());
        registry.install(LanguageKind::Rust, || rust::adapter());
        registry.install(LanguageKind::Go, || go::adapter());
        registry.install(LanguageKind::Java, || java::adapter());
        registry.install(LanguageKind::CSharp, || csharp::adapter());
        registry.install(LanguageKind::C, || c::adapter());
        registry.install(LanguageKind::Cpp, || cpp::adapter());
        registry.install(LanguageKind::Php, || php::adapter());
        registry.install(LanguageKind::Kotlin, || kotlin::adapter());
        registry.install(LanguageKind::Shell, || shell::adapter());
        registry
    }

    fn install(
        &mut self,
        language: LanguageKind,
        factory: impl Fn() -> Arc<dyn LanguageAdapter> + Send + Sync + 'static,
    ) {
        self.factories.insert(language, Box::new(factory));
    }

    /// Register a plugin adapter, replacing a built-in if present.
    pub fn register(
        &mut self,
        language: LanguageKind,
        factory: impl Fn() -> Arc<dyn LanguageAdapter> + Send + Sync + 'static,
    ) {
        if self.factories.contains_key(&language) {
            warn!(%language, "registry: plugin adapter overrides a built-in");
        }
        self.constructed.write().remove(&language);
        self.factories.insert(language, Box::new(factory));
    }

    /// Adapter for a language, constructing it on first use.
    pub fn adapter_for(&self, language: LanguageKind) -> Option<Arc<dyn LanguageAdapter>> {
        if let Some(adapter) = self.constructed.read().get(&language) {
            return Some(adapter.clone());
        }
        let factory = self.factories.get(&language)?;
        let adapter = factory();
        debug!(%language, "registry: adapter constructed");
        self.constructed
            .write()
            .entry(language)
            .or_insert(adapter.clone());
        Some(adapter)
    }

    /// Adapter for a file path, by extension.
    pub fn adapter_for_path(
        &self,
        path: &Path,
    ) -> Option<(LanguageKind, Arc<dyn LanguageAdapter>)> {
        let language = languages::detect_language(path)?;
        self.adapter_for(language).map(|a| (language, a))
    }

    pub fn languages(&self) -> Vec<LanguageKind> {
        let mut all: Vec<LanguageKind> = self.factories.keys().copied().collect();
        all.sort_by_key(|l| l.as_str());
        all
    }
}
