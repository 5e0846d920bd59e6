//! End-to-end scenarios over a real on-disk repo and ledger database.

use code_ledger::{
    CardOutcome, DetailLevel, IndexMode, Ledger, LedgerConfig, RefreshResponse, SliceBudget,
    SliceRequest,
};
use ledger_store::model::{EdgeType, ResolutionStrategy, SymbolKind};
use std::path::Path;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: std::path::PathBuf,
    ledger: Ledger,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");
    std::fs::create_dir_all(&root).unwrap();
    let db = dir.path().join("ledger.db");
    let raw = format!(
        r#"{{"repos":[{{"repoId":"r1","rootPath":"{}"}}],"dbPath":"{}"}}"#,
        root.display(),
        db.display()
    );
    let config = LedgerConfig::load_from_str(&raw).unwrap();
    let ledger = Ledger::open(config).unwrap();
    Fixture {
        _dir: dir,
        root,
        ledger,
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

async fn index(fx: &Fixture) -> code_ledger::IndexStats {
    fx.ledger
        .index_repo("r1", IndexMode::Incremental, None)
        .await
        .unwrap()
}

/// S1: one exported function; search finds exactly it, and its ID is the
/// content-addressed hash of `(repo, path, kind, name, fingerprint)`.
#[tokio::test]
async fn s1_single_function_search_and_identity() {
    let fx = fixture();
    write(
        &fx.root,
        "add.ts",
        "export function add(a:number,b:number){return a+b;}",
    );
    index(&fx).await;

    let hits = fx.ledger.search_symbols("r1", "add", 10).unwrap();
    assert_eq!(hits.len(), 1);
    let row = &hits[0];
    assert_eq!(row.kind, SymbolKind::Function);
    assert!(row.exported);
    assert_eq!(
        row.symbol_id,
        code_indexer::ids::symbol_id("r1", "add.ts", "function", "add", &row.ast_fingerprint)
    );
}

/// S2: an import plus a call across two files produce exactly one import
/// edge and one call edge, confidence 1.0, strategy "import".
#[tokio::test]
async fn s2_import_and_call_edges_across_files() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    write(
        &fx.root,
        "b.ts",
        "import { f } from './a';\nexport function g(){ return f(); }\n",
    );
    index(&fx).await;

    let f_id = fx.ledger.search_symbols("r1", "f", 10).unwrap()[0]
        .symbol_id
        .clone();
    let edges = fx.ledger.store().get_edges_by_repo("r1").unwrap();

    let imports: Vec<_> = edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Import)
        .collect();
    let calls: Vec<_> = edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Call)
        .collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(calls.len(), 1);

    assert_eq!(imports[0].to_symbol_id, f_id);
    let call = calls[0];
    assert_eq!(call.to_symbol_id, f_id);
    assert_eq!(call.confidence, 1.0);
    assert_eq!(call.resolution_strategy, ResolutionStrategy::Import);

    // The caller is the enclosing symbol in b.ts.
    let g = fx
        .ledger
        .search_symbols("r1", "g", 10)
        .unwrap()
        .into_iter()
        .find(|s| s.name == "g")
        .unwrap();
    assert_eq!(call.from_symbol_id, g.symbol_id);
}

/// S3/S4: detail-level fitting. A generous budget keeps the requested
/// compact level; a 200-token budget downgrades and never overshoots.
#[tokio::test]
async fn s3_s4_detail_levels_follow_the_budget() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    index(&fx).await;
    let f_id = fx.ledger.search_symbols("r1", "f", 10).unwrap()[0]
        .symbol_id
        .clone();

    let generous = SliceRequest {
        repo_id: "r1".to_string(),
        entry_symbols: vec![f_id.clone()],
        budget: Some(SliceBudget {
            max_cards: 24,
            max_estimated_tokens: 5_000,
        }),
        ..Default::default()
    };
    let response = fx.ledger.build_slice(&generous).await.unwrap();
    assert_eq!(response.detail_level_metadata.requested, DetailLevel::Compact);
    assert_eq!(response.detail_level_metadata.effective, DetailLevel::Compact);
    assert!(!response.detail_level_metadata.budget_adaptive);

    let tight = SliceRequest {
        budget: Some(SliceBudget {
            max_cards: 24,
            max_estimated_tokens: 200,
        }),
        ..generous
    };
    let response = fx.ledger.build_slice(&tight).await.unwrap();
    let meta = &response.detail_level_metadata;
    assert!(matches!(
        meta.effective,
        DetailLevel::Minimal | DetailLevel::Signature
    ));
    assert!(meta.budget_adaptive);

    // Recompute the estimate at the effective level: within budget.
    let row = fx.ledger.store().get_symbol(&f_id).unwrap().unwrap();
    let total = slice_engine::beam::BASE_OVERHEAD_TOKENS
        + slice_engine::cards::estimate_tokens(&row, meta.effective);
    assert!(total <= 200, "estimate {total} exceeds the 200-token budget");
}

/// S5: refresh returns notModified on an unchanged ledger and a non-empty
/// delta after a mutation and re-index.
#[tokio::test]
async fn s5_refresh_reports_not_modified_then_delta() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    index(&fx).await;
    let f_id = fx.ledger.search_symbols("r1", "f", 10).unwrap()[0]
        .symbol_id
        .clone();

    let request = SliceRequest {
        repo_id: "r1".to_string(),
        entry_symbols: vec![f_id],
        ..Default::default()
    };
    let response = fx.ledger.build_slice(&request).await.unwrap();
    let handle = response.lease.handle.clone();

    match fx.ledger.refresh_slice(&handle, None).await.unwrap() {
        RefreshResponse::NotModified { lease } => {
            assert_eq!(lease.handle, handle);
        }
        RefreshResponse::Modified { .. } => panic!("expected notModified on unchanged ledger"),
    }

    // Literal-only change: the AST shape (and thus the symbol ID) survives,
    // so the member shows up as changed rather than removed.
    write(&fx.root, "a.ts", "export function f(){ return 42; }\n");
    index(&fx).await;

    match fx.ledger.refresh_slice(&handle, None).await.unwrap() {
        RefreshResponse::Modified { delta, lease } => {
            assert!(!delta.changed_symbols.is_empty());
            assert_eq!(lease.handle, handle);
        }
        RefreshResponse::NotModified { .. } => panic!("expected a delta after re-index"),
    }
}

/// S6: a 45-entry spillover pages as 20/20/5 with cursors "20" and "40".
#[tokio::test]
async fn s6_spillover_pages_with_cursors() {
    let fx = fixture();
    let mut src = String::from("export function main(){\n");
    for i in 0..50 {
        src.push_str(&format!("  helper{i:02}();\n"));
    }
    src.push_str("}\n");
    for i in 0..50 {
        src.push_str(&format!("function helper{i:02}(){{ return {i}; }}\n"));
    }
    write(&fx.root, "hub.ts", &src);
    index(&fx).await;

    let main_id = fx
        .ledger
        .search_symbols("r1", "main", 10)
        .unwrap()
        .into_iter()
        .find(|s| s.name == "main")
        .unwrap()
        .symbol_id;
    let request = SliceRequest {
        repo_id: "r1".to_string(),
        entry_symbols: vec![main_id],
        budget: Some(SliceBudget {
            max_cards: 6,
            max_estimated_tokens: 30_000,
        }),
        ..Default::default()
    };
    let response = fx.ledger.build_slice(&request).await.unwrap();
    assert!(response.truncation.truncated);
    assert_eq!(response.truncation.dropped, 45);

    let handle = response.lease.handle;
    let page1 = fx
        .ledger
        .get_spillover(&handle, None, Some(20))
        .await
        .unwrap();
    assert_eq!(page1.items.len(), 20);
    assert_eq!(page1.next_cursor.as_deref(), Some("20"));

    let page2 = fx
        .ledger
        .get_spillover(&handle, Some("20"), Some(20))
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 20);
    assert_eq!(page2.next_cursor.as_deref(), Some("40"));

    let page3 = fx
        .ledger
        .get_spillover(&handle, Some("40"), Some(20))
        .await
        .unwrap();
    assert_eq!(page3.items.len(), 5);
    assert!(!page3.has_more);
}

/// Incrementality: unchanged bytes re-index with zero symbol writes; a
/// changed byte rewrites that file's rows.
#[tokio::test]
async fn incremental_reindex_skips_unchanged_files() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    write(&fx.root, "b.ts", "export function g(){ return 2; }\n");

    let first = index(&fx).await;
    assert_eq!(first.files_processed, 2);
    assert!(first.symbols_indexed >= 2);

    let second = index(&fx).await;
    assert_eq!(second.symbols_indexed, 0);
    assert!(second.version_id > first.version_id);

    write(&fx.root, "b.ts", "export function g(){ return 3 + 1; }\n");
    let third = index(&fx).await;
    assert!(third.symbols_indexed >= 1);
}

/// Pruning: a deleted file's symbols vanish with the next version.
#[tokio::test]
async fn deleted_files_are_pruned_on_reindex() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    write(&fx.root, "gone.ts", "export function doomed(){ return 0; }\n");
    index(&fx).await;
    assert_eq!(fx.ledger.search_symbols("r1", "doomed", 10).unwrap().len(), 1);

    std::fs::remove_file(fx.root.join("gone.ts")).unwrap();
    index(&fx).await;
    assert!(fx.ledger.search_symbols("r1", "doomed", 10).unwrap().is_empty());
}

/// ETag idempotence: the same knownEtag yields notModified twice, with the
/// same ETag both times.
#[tokio::test]
async fn etag_validation_is_idempotent() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    index(&fx).await;
    let f_id = fx.ledger.search_symbols("r1", "f", 10).unwrap()[0]
        .symbol_id
        .clone();

    let etag = match fx.ledger.get_card("r1", &f_id, None).await.unwrap() {
        CardOutcome::Card(card) => card.etag.clone(),
        CardOutcome::NotModified { .. } => panic!("first fetch must return the card"),
    };

    for _ in 0..2 {
        match fx.ledger.get_card("r1", &f_id, Some(&etag)).await.unwrap() {
            CardOutcome::NotModified { etag: fresh } => assert_eq!(fresh, etag),
            CardOutcome::Card(_) => panic!("expected notModified"),
        }
    }
}

/// Cache safety: after invalidating the current version, the next card
/// lookup is a miss and recomputes.
#[tokio::test]
async fn invalidated_version_entries_are_not_served() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    let stats = index(&fx).await;
    let f_id = fx.ledger.search_symbols("r1", "f", 10).unwrap()[0]
        .symbol_id
        .clone();

    fx.ledger.get_card("r1", &f_id, None).await.unwrap();
    fx.ledger.get_card("r1", &f_id, None).await.unwrap();
    let (cards_before, _) = fx.ledger.cache_stats();
    assert!(cards_before.hits >= 1);

    fx.ledger.invalidate_version(&stats.version_id);
    fx.ledger.get_card("r1", &f_id, None).await.unwrap();
    let (cards_after, _) = fx.ledger.cache_stats();
    assert!(cards_after.misses > cards_before.misses);
}

/// Error taxonomy: unknown repo, never-indexed repo, empty seed set.
#[tokio::test]
async fn typed_errors_for_bad_requests() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");

    let unknown = fx.ledger.search_symbols("nope", "f", 10);
    assert!(matches!(unknown, Err(code_ledger::CoreError::InvalidRepo(_))));

    let request = SliceRequest {
        repo_id: "r1".to_string(),
        entry_symbols: vec!["id_missing".to_string()],
        ..Default::default()
    };
    let no_version = fx.ledger.build_slice(&request).await;
    assert!(matches!(no_version, Err(code_ledger::CoreError::NoVersion(_))));

    index(&fx).await;
    let no_symbols = fx.ledger.build_slice(&request).await;
    assert!(matches!(no_symbols, Err(code_ledger::CoreError::NoSymbols)));
}

/// Policy: budgets above the window cap are denied with a next-best-action.
#[tokio::test]
async fn oversized_budget_is_policy_denied() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    index(&fx).await;
    let f_id = fx.ledger.search_symbols("r1", "f", 10).unwrap()[0]
        .symbol_id
        .clone();

    let request = SliceRequest {
        repo_id: "r1".to_string(),
        entry_symbols: vec![f_id],
        budget: Some(SliceBudget {
            max_cards: 24,
            max_estimated_tokens: 10_000_000,
        }),
        ..Default::default()
    };
    match fx.ledger.build_slice(&request).await {
        Err(code_ledger::CoreError::PolicyDenied {
            next_best_action, ..
        }) => {
            assert!(next_best_action.contains("maxEstimatedTokens"));
        }
        other => panic!("expected PolicyDenied, got {other:?}"),
    }
}

/// Slices are deterministic given `(version, request)` and the v3 payload
/// expands to the v2 edge set.
#[tokio::test]
async fn slices_are_deterministic_and_wire_versions_agree() {
    let fx = fixture();
    write(&fx.root, "a.ts", "export function f(){ return 1; }\n");
    write(
        &fx.root,
        "b.ts",
        "import { f } from './a';\nexport function g(){ return f(); }\n",
    );
    index(&fx).await;
    let g_id = fx
        .ledger
        .search_symbols("r1", "g", 10)
        .unwrap()
        .into_iter()
        .find(|s| s.name == "g")
        .unwrap()
        .symbol_id;

    let request = |wire: u8| SliceRequest {
        repo_id: "r1".to_string(),
        entry_symbols: vec![g_id.clone()],
        wire_format_version: Some(wire),
        ..Default::default()
    };

    let v2a = fx.ledger.build_slice(&request(2)).await.unwrap();
    let v2b = fx.ledger.build_slice(&request(2)).await.unwrap();
    assert_eq!(v2a.payload, v2b.payload);

    let v3 = fx.ledger.build_slice(&request(3)).await.unwrap();
    let expanded = slice_engine::wire::expand_v3_to_v2(&v3.payload).unwrap();
    let mut edges_v2 = slice_engine::wire::decode_edges(&v2a.payload).unwrap();
    let mut edges_v3 = slice_engine::wire::decode_edges(&expanded).unwrap();
    edges_v2.sort();
    edges_v3.sort();
    assert_eq!(edges_v2, edges_v3);
    assert_eq!(
        slice_engine::wire::decode_card_order(&v2a.payload).unwrap(),
        slice_engine::wire::decode_card_order(&v3.payload).unwrap()
    );
}

/// Determinism across runs: re-indexing identical bytes into a fresh ledger
/// yields identical symbol IDs and fingerprints.
#[tokio::test]
async fn identical_sources_yield_identical_ids_across_ledgers() {
    let sources = [
        ("a.ts", "export function f(){ return 1; }\n"),
        (
            "b.ts",
            "import { f } from './a';\nexport function g(){ return f(); }\n",
        ),
    ];

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let fx = fixture();
        for (rel, contents) in &sources {
            write(&fx.root, rel, contents);
        }
        index(&fx).await;
        let mut rows = fx.ledger.store().get_symbols_by_repo("r1").unwrap();
        rows.sort_by(|a, b| a.symbol_id.cmp(&b.symbol_id));
        snapshots.push(
            rows.into_iter()
                .map(|r| (r.symbol_id, r.name, r.ast_fingerprint))
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(snapshots[0], snapshots[1]);
}
