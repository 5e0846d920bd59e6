//! Embedded relational ledger for the code-intelligence graph.
//!
//! One SQLite file holds repos, versions, files, symbols, edges, metrics and
//! slice handles. The write path is transactional with version-gated
//! visibility: an indexing run becomes observable only when its version row
//! lands, so readers flip between complete snapshots.

pub mod errors;
pub mod model;
mod queries;
pub mod rows;
mod schema;
mod store;

pub use errors::{Error, Result};
pub use queries::versions::next_version_id;
pub use store::{IndexCommit, Store};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeType, ResolutionStrategy, SymbolKind, SymbolRange};
    use crate::rows::{EdgeRow, FileRow, SliceHandleRow, SymbolRow};

    fn symbol(repo: &str, file: &str, id: &str, name: &str) -> SymbolRow {
        SymbolRow {
            symbol_id: id.to_string(),
            repo_id: repo.to_string(),
            file_id: file.to_string(),
            kind: SymbolKind::Function,
            name: name.to_string(),
            exported: true,
            visibility: None,
            language: "typescript".to_string(),
            range: SymbolRange::new(0, 0, 2, 1),
            ast_fingerprint: "fp".to_string(),
            signature_json: None,
            summary: None,
            invariants_json: None,
            side_effects_json: None,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn commit_one_file(store: &Store, repo: &str, names: &[&str]) {
        let version = store.next_version(repo).unwrap();
        let file = FileRow {
            file_id: "f1".to_string(),
            repo_id: repo.to_string(),
            rel_path: "a.ts".to_string(),
            content_hash: "h1".to_string(),
            language: "typescript".to_string(),
            bytes: 10,
            last_seen_version: version.version_id.clone(),
        };
        let symbols = names
            .iter()
            .map(|n| symbol(repo, "f1", &format!("id_{n}"), n))
            .collect::<Vec<_>>();
        store
            .commit_index_run(&IndexCommit {
                repo_id: repo.to_string(),
                version: Some(version),
                files: vec![file],
                symbols: vec![("f1".to_string(), symbols)],
                purge_edges_from: vec![],
                edges: vec![],
            })
            .unwrap();
    }

    #[test]
    fn migrations_are_idempotent_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let store = Store::open(&path).unwrap();
            store.create_repo("r1", "/tmp/r1", None).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.get_repo("r1").unwrap().is_some());
    }

    #[test]
    fn version_row_lands_last_and_is_monotone() {
        let store = Store::open_in_memory().unwrap();
        store.create_repo("r1", "/tmp/r1", None).unwrap();
        assert!(store.get_latest_version("r1").unwrap().is_none());

        commit_one_file(&store, "r1", &["alpha"]);
        let v1 = store.get_latest_version("r1").unwrap().unwrap();
        commit_one_file(&store, "r1", &["alpha", "beta"]);
        let v2 = store.get_latest_version("r1").unwrap().unwrap();

        assert!(v1.version_id < v2.version_id);
        assert_eq!(v2.parent.as_deref(), Some(v1.version_id.as_str()));
    }

    #[test]
    fn per_file_rewrite_deletes_stale_symbols_and_their_edges() {
        let store = Store::open_in_memory().unwrap();
        store.create_repo("r1", "/tmp/r1", None).unwrap();
        commit_one_file(&store, "r1", &["alpha", "beta"]);
        store
            .upsert_edge(&EdgeRow {
                repo_id: "r1".to_string(),
                from_symbol_id: "id_alpha".to_string(),
                to_symbol_id: "id_beta".to_string(),
                edge_type: EdgeType::Call,
                weight: 1.0,
                confidence: 0.9,
                resolution_strategy: ResolutionStrategy::SameFile,
                provenance: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            })
            .unwrap();

        // Re-index with beta gone.
        commit_one_file(&store, "r1", &["alpha"]);
        assert!(store.get_symbol("id_beta").unwrap().is_none());
        assert!(store.get_edges_from("id_alpha").unwrap().is_empty());
        assert!(store.get_symbol("id_alpha").unwrap().is_some());
    }

    #[test]
    fn search_is_prefix_first_with_stable_tiebreak() {
        let store = Store::open_in_memory().unwrap();
        store.create_repo("r1", "/tmp/r1", None).unwrap();
        commit_one_file(&store, "r1", &["parse", "parseAll", "reparse"]);

        let hits = store.search_symbols("r1", "parse", 10).unwrap();
        let names: Vec<&str> = hits.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["parse", "parseAll", "reparse"]);
    }

    #[test]
    fn expired_handles_are_collected_on_read() {
        let store = Store::open_in_memory().unwrap();
        let row = SliceHandleRow {
            handle: "h1".to_string(),
            repo_id: "r1".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            expires_at: "2026-01-01T00:15:00Z".to_string(),
            min_version: None,
            max_version: "v0000000001".to_string(),
            slice_hash: "abc".to_string(),
            members_json: None,
            spillover_json: None,
        };
        store.create_slice_handle(&row).unwrap();

        assert!(store
            .get_slice_handle("h1", "2026-01-01T00:10:00Z")
            .unwrap()
            .is_some());
        assert!(store
            .get_slice_handle("h1", "2026-01-01T00:20:00Z")
            .unwrap()
            .is_none());
        // GC really removed the row.
        assert!(store
            .get_slice_handle("h1", "2026-01-01T00:10:00Z")
            .unwrap()
            .is_none());
    }

    #[test]
    fn metrics_reflect_edge_counts_after_commit() {
        let store = Store::open_in_memory().unwrap();
        store.create_repo("r1", "/tmp/r1", None).unwrap();

        let version = store.next_version("r1").unwrap();
        let file = FileRow {
            file_id: "f1".to_string(),
            repo_id: "r1".to_string(),
            rel_path: "a.ts".to_string(),
            content_hash: "h1".to_string(),
            language: "typescript".to_string(),
            bytes: 10,
            last_seen_version: version.version_id.clone(),
        };
        let symbols = vec![
            symbol("r1", "f1", "id_a", "a"),
            symbol("r1", "f1", "id_b", "b"),
        ];
        let edge = EdgeRow {
            repo_id: "r1".to_string(),
            from_symbol_id: "id_a".to_string(),
            to_symbol_id: "id_b".to_string(),
            edge_type: EdgeType::Call,
            weight: 1.0,
            confidence: 1.0,
            resolution_strategy: ResolutionStrategy::SameFile,
            provenance: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        store
            .commit_index_run(&IndexCommit {
                repo_id: "r1".to_string(),
                version: Some(version),
                files: vec![file],
                symbols: vec![("f1".to_string(), symbols)],
                purge_edges_from: vec![],
                edges: vec![edge],
            })
            .unwrap();

        let m_a = store.get_metrics("id_a").unwrap().unwrap();
        let m_b = store.get_metrics("id_b").unwrap().unwrap();
        assert_eq!((m_a.fan_out, m_a.fan_in), (1, 0));
        assert_eq!((m_b.fan_out, m_b.fan_in), (0, 1));
        assert_eq!(m_a.churn30d, 1);
    }
}
