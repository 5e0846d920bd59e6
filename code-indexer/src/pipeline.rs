//! Two-pass indexing pipeline.
//!
//! Pass 1 scans candidates, hashes content, parses changed files on a
//! bounded worker pool, and extracts symbols + imports. Pass 2 builds
//! repo-wide resolution indices and binds call edges. Everything lands in
//! one atomic commit whose version row goes in last, so readers flip
//! between complete snapshots.
//!
//! A parse failure is isolated to its file: the old row keeps its previous
//! hash so the next run retries.

use crate::adapter::{AdapterRegistry, LanguageAdapter, ResolveCtx};
use crate::errors::{Error, Result};
use crate::fingerprint::CollisionTracker;
use crate::ids;
use crate::languages::LanguageKind;
use crate::resolve;
use crate::scan::{ScanFilters, ScannedFile, scan_repo};
use crate::types::FileExtraction;
use ledger_store::model::{EdgeType, ResolutionStrategy, SymbolKind, SymbolRange};
use ledger_store::rows::{EdgeRow, FileRow, SymbolRow};
use ledger_store::{IndexCommit, Store};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const ENGINE: &str = "tree-sitter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone)]
pub struct RepoSpec {
    pub repo_id: String,
    pub root_path: PathBuf,
    pub filters: ScanFilters,
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub mode: IndexMode,
    pub concurrency: usize,
    pub per_file_timeout: Duration,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            mode: IndexMode::Incremental,
            concurrency: 8,
            per_file_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub phase: &'static str,
    pub done: usize,
    pub total: usize,
}

pub type ProgressFn = Arc<dyn Fn(IndexProgress) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub files_processed: usize,
    pub symbols_indexed: usize,
    pub edges_created: usize,
    pub duration_ms: u64,
    pub engine: &'static str,
    pub version_id: String,
    pub prior_version: Option<String>,
}

enum FileOutcome {
    Unchanged {
        rel_path: String,
    },
    Parsed(Box<ParsedFile>),
    Failed {
        rel_path: String,
        message: String,
    },
}

struct ParsedFile {
    rel_path: String,
    language: LanguageKind,
    hash: String,
    size: u64,
    extraction: FileExtraction,
    adapter: Arc<dyn LanguageAdapter>,
    // Filled during assembly.
    file_id: String,
    rows: Vec<SymbolRow>,
    module_symbol: Option<SymbolRow>,
}

/// Index one repository, producing a new ledger version.
#[tracing::instrument(level = "info", skip_all, fields(repo = %repo.repo_id))]
pub async fn index_repo(
    store: &Store,
    registry: &AdapterRegistry,
    repo: &RepoSpec,
    opts: &IndexOptions,
    progress: Option<ProgressFn>,
) -> Result<IndexStats> {
    let started = Instant::now();

    // Pass 1a: enumerate candidates.
    let scanned = {
        let root = repo.root_path.clone();
        let filters = repo.filters.clone();
        tokio::task::spawn_blocking(move || scan_repo(&root, &filters))
            .await
            .map_err(|_| Error::InvalidState("scan task aborted"))??
    };
    report(&progress, "scan", scanned.len(), scanned.len());

    let stored = store.files_by_rel_path(&repo.repo_id)?;
    let version = store.next_version(&repo.repo_id)?;
    let prior_version = version.parent.clone();

    // Pass 1b: hash + parse changed files on the worker pool.
    let total = scanned.len();
    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut join: JoinSet<FileOutcome> = JoinSet::new();
    for file in scanned {
        let Some((language, adapter)) = registry.adapter_for_path(&file.abs_path) else {
            continue;
        };
        let stored_hash = stored.get(&file.rel_path).map(|f| f.content_hash.clone());
        let incremental = opts.mode == IndexMode::Incremental;
        let semaphore = semaphore.clone();
        let per_file_timeout = opts.per_file_timeout;
        join.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    return FileOutcome::Failed {
                        rel_path: file.rel_path,
                        message: "worker pool closed".to_string(),
                    };
                }
            };
            let rel_path = file.rel_path.clone();
            let work =
                tokio::task::spawn_blocking(move || parse_one(file, language, adapter, stored_hash, incremental));
            match tokio::time::timeout(per_file_timeout, work).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => FileOutcome::Failed {
                    rel_path,
                    message: format!("parse worker panicked: {err}"),
                },
                Err(_) => FileOutcome::Failed {
                    rel_path,
                    message: "per-file timeout elapsed".to_string(),
                },
            }
        });
    }

    let mut parsed: Vec<ParsedFile> = Vec::new();
    let mut unchanged: Vec<String> = Vec::new();
    let mut failed_paths: Vec<String> = Vec::new();
    let mut done = 0usize;
    while let Some(joined) = join.join_next().await {
        done += 1;
        report(&progress, "parse", done, total);
        match joined.map_err(|_| Error::InvalidState("parse task aborted"))? {
            FileOutcome::Parsed(p) => parsed.push(*p),
            FileOutcome::Unchanged { rel_path } => unchanged.push(rel_path),
            FileOutcome::Failed { rel_path, message } => {
                warn!(file = %rel_path, message = %message, "index: file isolated after failure");
                failed_paths.push(rel_path);
            }
        }
    }
    // Worker completion order is nondeterministic; everything downstream is not.
    parsed.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    unchanged.sort();

    // Assembly: content-addressed rows for every re-parsed file.
    let mut collisions = CollisionTracker::new();
    for p in &mut parsed {
        assemble_rows(&repo.repo_id, &version.created_at, &version.version_id, p, &mut collisions);
    }

    // Stored rows of unchanged files still participate in resolution.
    let mut unchanged_rows: Vec<(String, Vec<SymbolRow>)> = Vec::new();
    for rel_path in &unchanged {
        if let Some(stored_file) = stored.get(rel_path) {
            let rows = store.get_symbols_by_file(&stored_file.file_id)?;
            unchanged_rows.push((rel_path.clone(), rows));
        }
    }

    // Pass 2: resolution indices and edges.
    let edges = build_edges(&repo.repo_id, &version.created_at, &parsed, &unchanged_rows);

    // Commit.
    let mut files = Vec::new();
    let mut symbols = Vec::new();
    let mut purge_edges_from = Vec::new();
    let mut symbols_indexed = 0usize;

    for p in &parsed {
        files.push(FileRow {
            file_id: p.file_id.clone(),
            repo_id: repo.repo_id.clone(),
            rel_path: p.rel_path.clone(),
            content_hash: p.hash.clone(),
            language: p.language.as_str().to_string(),
            bytes: p.size as i64,
            last_seen_version: version.version_id.clone(),
        });
        let mut rows = p.rows.clone();
        if let Some(module) = &p.module_symbol {
            rows.push(module.clone());
        }
        symbols_indexed += rows.len();
        purge_edges_from.extend(rows.iter().map(|r| r.symbol_id.clone()));
        symbols.push((p.file_id.clone(), rows));
    }
    for rel_path in &unchanged {
        if let Some(stored_file) = stored.get(rel_path) {
            let mut bumped = stored_file.clone();
            bumped.last_seen_version = version.version_id.clone();
            files.push(bumped);
        }
    }
    // Failed files keep their previous hash so the next run retries, but are
    // bumped so pruning spares them. Files that vanished stay unbumped and
    // get pruned by the commit.
    for rel_path in &failed_paths {
        if let Some(stored_file) = stored.get(rel_path) {
            let mut bumped = stored_file.clone();
            bumped.last_seen_version = version.version_id.clone();
            files.push(bumped);
        }
    }

    let files_processed = parsed.len() + unchanged.len();
    let edges_created = edges.len();
    let commit = IndexCommit {
        repo_id: repo.repo_id.clone(),
        version: Some(version.clone()),
        files,
        symbols,
        purge_edges_from,
        edges,
    };
    store.commit_index_run(&commit)?;
    report(&progress, "commit", 1, 1);

    let stats = IndexStats {
        files_processed,
        symbols_indexed,
        edges_created,
        duration_ms: started.elapsed().as_millis() as u64,
        engine: ENGINE,
        version_id: version.version_id.clone(),
        prior_version,
    };
    info!(
        files = stats.files_processed,
        reparsed = parsed.len(),
        unchanged = unchanged.len(),
        failed = failed_paths.len(),
        symbols = stats.symbols_indexed,
        edges = stats.edges_created,
        fingerprint_collisions = collisions.collisions(),
        duration_ms = stats.duration_ms,
        version = %stats.version_id,
        "index: run complete"
    );
    Ok(stats)
}

fn report(progress: &Option<ProgressFn>, phase: &'static str, done: usize, total: usize) {
    if let Some(cb) = progress {
        cb(IndexProgress { phase, done, total });
    }
}

fn parse_one(
    file: ScannedFile,
    language: LanguageKind,
    adapter: Arc<dyn LanguageAdapter>,
    stored_hash: Option<String>,
    incremental: bool,
) -> FileOutcome {
    let bytes = match std::fs::read(&file.abs_path) {
        Ok(b) => b,
        Err(err) => {
            return FileOutcome::Failed {
                rel_path: file.rel_path,
                message: format!("read failed: {err}"),
            };
        }
    };
    let hash = ids::file_content_hash(&bytes);
    if incremental && stored_hash.as_deref() == Some(hash.as_str()) {
        return FileOutcome::Unchanged {
            rel_path: file.rel_path,
        };
    }

    let source = String::from_utf8_lossy(&bytes).into_owned();
    let Some(tree) = adapter.parse(&source) else {
        return FileOutcome::Failed {
            rel_path: file.rel_path,
            message: "parser could not open a tree".to_string(),
        };
    };
    let symbols = adapter.extract_symbols(&tree, &source, &file.rel_path);
    let imports = adapter.extract_imports(&tree, &source, &file.rel_path);
    let calls = adapter.extract_calls(&tree, &source, &file.rel_path, &symbols);
    debug!(
        file = %file.rel_path,
        symbols = symbols.len(),
        imports = imports.len(),
        calls = calls.len(),
        "index: extracted"
    );

    FileOutcome::Parsed(Box::new(ParsedFile {
        rel_path: file.rel_path,
        language,
        hash,
        size: file.size,
        extraction: FileExtraction {
            symbols,
            imports,
            calls,
        },
        adapter,
        file_id: String::new(),
        rows: Vec::new(),
        module_symbol: None,
    }))
}

fn assemble_rows(
    repo_id: &str,
    updated_at: &str,
    _version_id: &str,
    parsed: &mut ParsedFile,
    collisions: &mut CollisionTracker,
) {
    parsed.file_id = ids::file_id(repo_id, &parsed.rel_path);

    let mut seen_ids = HashSet::new();
    let mut rows = Vec::with_capacity(parsed.extraction.symbols.len());
    for es in &parsed.extraction.symbols {
        collisions.observe(&es.ast_fingerprint, &parsed.rel_path, &es.name);
        let symbol_id = ids::symbol_id(
            repo_id,
            &parsed.rel_path,
            es.kind.as_str(),
            &es.name,
            &es.ast_fingerprint,
        );
        if !seen_ids.insert(symbol_id.clone()) {
            continue;
        }
        rows.push(SymbolRow {
            symbol_id,
            repo_id: repo_id.to_string(),
            file_id: parsed.file_id.clone(),
            kind: es.kind,
            name: es.name.clone(),
            exported: es.exported,
            visibility: es.visibility,
            language: parsed.language.as_str().to_string(),
            range: es.range,
            ast_fingerprint: es.ast_fingerprint.clone(),
            signature_json: es
                .signature
                .as_ref()
                .map(|s| serde_json::json!({ "text": s }).to_string()),
            summary: es.doc.clone(),
            invariants_json: None,
            side_effects_json: None,
            updated_at: updated_at.to_string(),
        });
    }
    parsed.rows = rows;

    // Top-level code and import directives hang off a synthetic module symbol.
    let needs_module = !parsed.extraction.imports.is_empty()
        || parsed.extraction.calls.iter().any(|c| c.caller.is_none());
    if needs_module {
        let name = module_name(&parsed.rel_path);
        let fingerprint = "module".to_string();
        parsed.module_symbol = Some(SymbolRow {
            symbol_id: ids::symbol_id(
                repo_id,
                &parsed.rel_path,
                SymbolKind::Module.as_str(),
                &name,
                &fingerprint,
            ),
            repo_id: repo_id.to_string(),
            file_id: parsed.file_id.clone(),
            kind: SymbolKind::Module,
            name,
            exported: true,
            visibility: None,
            language: parsed.language.as_str().to_string(),
            range: SymbolRange::default(),
            ast_fingerprint: fingerprint,
            signature_json: None,
            summary: None,
            invariants_json: None,
            side_effects_json: None,
            updated_at: updated_at.to_string(),
        });
    }
}

fn module_name(rel_path: &str) -> String {
    let file = rel_path.rsplit('/').next().unwrap_or(rel_path);
    file.split_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or_else(|| file.to_string())
}

fn strip_extension(rel_path: &str) -> &str {
    match rel_path.rfind('.') {
        Some(dot) if rel_path[dot..].len() <= 5 && !rel_path[dot + 1..].contains('/') => {
            &rel_path[..dot]
        }
        _ => rel_path,
    }
}

/// Pass 2: indices + edge resolution over the re-parsed files.
fn build_edges(
    repo_id: &str,
    created_at: &str,
    parsed: &[ParsedFile],
    unchanged: &[(String, Vec<SymbolRow>)],
) -> Vec<EdgeRow> {
    // Per-file exported members, the backbone of import + namespace lookups.
    let mut module_exports: HashMap<String, BTreeMap<String, String>> = HashMap::new();
    let mut repo_names: HashMap<String, Vec<String>> = HashMap::new();
    let mut known_paths: Vec<String> = Vec::new();

    let mut note_rows = |rel_path: &str, rows: &[SymbolRow]| {
        known_paths.push(rel_path.to_string());
        let exports = module_exports.entry(rel_path.to_string()).or_default();
        for row in rows {
            if row.kind == SymbolKind::Module {
                continue;
            }
            if row.exported {
                exports
                    .entry(row.name.clone())
                    .or_insert_with(|| row.symbol_id.clone());
            }
            repo_names
                .entry(row.name.clone())
                .or_default()
                .push(row.symbol_id.clone());
        }
    };
    for p in parsed {
        note_rows(&p.rel_path, &p.rows);
    }
    for (rel_path, rows) in unchanged {
        note_rows(rel_path, rows);
    }
    for ids in repo_names.values_mut() {
        ids.sort();
        ids.dedup();
    }
    known_paths.sort();

    let mut edges: HashMap<(String, String, EdgeType), EdgeRow> = HashMap::new();
    let mut push_edge = |edge: EdgeRow| {
        let key = (
            edge.from_symbol_id.clone(),
            edge.to_symbol_id.clone(),
            edge.edge_type,
        );
        match edges.get(&key) {
            Some(existing) if existing.confidence >= edge.confidence => {}
            _ => {
                edges.insert(key, edge);
            }
        }
    };

    for p in parsed {
        // Same-file index.
        let mut same_file: HashMap<String, Vec<String>> = HashMap::new();
        for row in &p.rows {
            same_file
                .entry(row.name.clone())
                .or_default()
                .push(row.symbol_id.clone());
        }
        for ids in same_file.values_mut() {
            ids.sort();
        }

        // Imported names and namespace aliases.
        let mut imported: HashMap<String, Vec<String>> = HashMap::new();
        let mut namespaces: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        let mut import_targets: Vec<String> = Vec::new();

        for import in &p.extraction.imports {
            let target = resolve_specifier(&p.rel_path, &import.specifier, import.is_relative, &known_paths);
            let Some(target_rel) = target else {
                continue;
            };
            let Some(exports) = module_exports.get(&target_rel) else {
                continue;
            };
            for name in &import.names {
                if let Some(id) = exports.get(&name.name) {
                    imported
                        .entry(name.local_name().to_string())
                        .or_default()
                        .push(id.clone());
                    import_targets.push(id.clone());
                }
            }
            if let Some(alias) = &import.namespace_alias {
                namespaces.insert(alias.clone(), exports.clone());
            }
        }
        for ids in imported.values_mut() {
            ids.sort();
            ids.dedup();
        }

        // Same-file classes are namespaces for `Type.method()` calls.
        for row in &p.rows {
            if matches!(row.kind, SymbolKind::Class | SymbolKind::Interface) {
                let mut members = BTreeMap::new();
                for (idx, es) in p.extraction.symbols.iter().enumerate() {
                    if es.owner_path.last() == Some(&row.name) {
                        if let Some(id) = symbol_row_for_index(p, idx) {
                            members.entry(es.name.clone()).or_insert(id);
                        }
                    }
                }
                if !members.is_empty() {
                    namespaces.entry(row.name.clone()).or_insert(members);
                }
            }
        }

        let module_id = p.module_symbol.as_ref().map(|m| m.symbol_id.clone());

        // Import edges, provenance "import".
        if let Some(module_id) = &module_id {
            for target in &import_targets {
                push_edge(EdgeRow {
                    repo_id: repo_id.to_string(),
                    from_symbol_id: module_id.clone(),
                    to_symbol_id: target.clone(),
                    edge_type: EdgeType::Import,
                    weight: 1.0,
                    confidence: resolve::CONFIDENCE_EXACT,
                    resolution_strategy: ResolutionStrategy::Import,
                    provenance: Some("import".to_string()),
                    created_at: created_at.to_string(),
                });
            }
        }

        // Call edges.
        let ctx = ResolveCtx {
            imported: &imported,
            namespaces: &namespaces,
            same_file: &same_file,
            repo_names: &repo_names,
        };
        for call in &p.extraction.calls {
            let from = match call.caller {
                Some(idx) => match symbol_row_for_index(p, idx) {
                    Some(id) => id,
                    None => continue,
                },
                None => match &module_id {
                    Some(id) => id.clone(),
                    None => continue,
                },
            };
            let bound = p
                .adapter
                .resolve_call(call, &ctx)
                .unwrap_or_else(|| resolve::resolve_call(call, &ctx));
            // Recursive self-calls are legal cycles and stay in the graph.
            push_edge(EdgeRow {
                repo_id: repo_id.to_string(),
                from_symbol_id: from,
                to_symbol_id: bound.symbol_id,
                edge_type: EdgeType::Call,
                weight: 1.0,
                confidence: bound.confidence,
                resolution_strategy: bound.strategy,
                provenance: Some(format!("call:{}", bound.strategy)),
                created_at: created_at.to_string(),
            });
        }
    }

    let mut out: Vec<EdgeRow> = edges.into_values().collect();
    out.sort_by(|a, b| {
        (
            a.from_symbol_id.as_str(),
            a.to_symbol_id.as_str(),
            a.edge_type.as_str(),
        )
            .cmp(&(
                b.from_symbol_id.as_str(),
                b.to_symbol_id.as_str(),
                b.edge_type.as_str(),
            ))
    });
    out
}

/// Extraction index → persisted row (duplicates were deduped during
/// assembly, so look the row up by its recomputed identity).
fn symbol_row_for_index(p: &ParsedFile, idx: usize) -> Option<String> {
    let es = p.extraction.symbols.get(idx)?;
    p.rows
        .iter()
        .find(|r| {
            r.name == es.name && r.kind == es.kind && r.ast_fingerprint == es.ast_fingerprint
        })
        .map(|r| r.symbol_id.clone())
}

/// Map an import specifier to a known repo-relative path.
fn resolve_specifier(
    importing: &str,
    specifier: &str,
    is_relative: bool,
    known_paths: &[String],
) -> Option<String> {
    if is_relative {
        let dir = match importing.rsplit_once('/') {
            Some((d, _)) => d,
            None => "",
        };
        let joined = normalize_join(dir, specifier);
        // Exact, extension-probed, then index files.
        if known_paths.iter().any(|p| p == &joined) {
            return Some(joined);
        }
        for known in known_paths {
            if strip_extension(known) == joined {
                return Some(known.clone());
            }
        }
        for known in known_paths {
            if let Some(rest) = known.strip_prefix(&format!("{joined}/")) {
                if rest.starts_with("index.") || rest.starts_with("__init__.") {
                    return Some(known.clone());
                }
            }
        }
        return None;
    }

    // Package-style specifiers: translate separators and match by suffix.
    let translated = specifier
        .replace("::", "/")
        .replace('.', "/")
        .replace('\\', "/");
    let mut candidates: Vec<&String> = known_paths
        .iter()
        .filter(|p| {
            let stem = strip_extension(p);
            stem == translated || stem.ends_with(&format!("/{translated}"))
        })
        .collect();
    candidates.sort();
    candidates.first().map(|p| (*p).clone())
}

fn normalize_join(dir: &str, spec: &str) -> String {
    let mut parts: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };
    for seg in spec.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_specifiers_probe_known_extensions() {
        let known = vec![
            "src/a.ts".to_string(),
            "src/lib/index.ts".to_string(),
            "pkg/mod.py".to_string(),
        ];
        assert_eq!(
            resolve_specifier("src/b.ts", "./a", true, &known),
            Some("src/a.ts".to_string())
        );
        assert_eq!(
            resolve_specifier("src/b.ts", "./lib", true, &known),
            Some("src/lib/index.ts".to_string())
        );
        assert_eq!(resolve_specifier("src/b.ts", "./missing", true, &known), None);
    }

    #[test]
    fn package_specifiers_match_by_suffix() {
        let known = vec!["pkg/mod.py".to_string(), "other/util.py".to_string()];
        assert_eq!(
            resolve_specifier("main.py", "pkg.mod", false, &known),
            Some("pkg/mod.py".to_string())
        );
        assert_eq!(
            resolve_specifier("main.py", "mod", false, &known),
            Some("pkg/mod.py".to_string())
        );
        assert_eq!(resolve_specifier("main.py", "nope", false, &known), None);
    }

    #[test]
    fn module_names_drop_extensions() {
        assert_eq!(module_name("src/a.ts"), "a");
        assert_eq!(module_name("lib.rs"), "lib");
        assert_eq!(module_name("Makefile"), "Makefile");
    }
}
