//! Schema creation and idempotent migrations.
//!
//! A `meta` table records the applied schema version; every migration is
//! guarded by it, so opening an already-migrated database is a no-op.

use crate::errors::Result;
use rusqlite::Connection;
use tracing::info;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repos (
    repo_id     TEXT PRIMARY KEY,
    root_path   TEXT NOT NULL,
    config_json TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS versions (
    version_id TEXT PRIMARY KEY,
    repo_id    TEXT NOT NULL REFERENCES repos(repo_id),
    created_at TEXT NOT NULL,
    parent     TEXT
);
CREATE INDEX IF NOT EXISTS idx_versions_repo ON versions(repo_id, version_id);

CREATE TABLE IF NOT EXISTS files (
    file_id           TEXT PRIMARY KEY,
    repo_id           TEXT NOT NULL,
    rel_path          TEXT NOT NULL,
    content_hash      TEXT NOT NULL,
    language          TEXT NOT NULL,
    bytes             INTEGER NOT NULL,
    last_seen_version TEXT NOT NULL,
    UNIQUE(repo_id, rel_path)
);

CREATE TABLE IF NOT EXISTS symbols (
    symbol_id        TEXT PRIMARY KEY,
    repo_id          TEXT NOT NULL,
    file_id          TEXT NOT NULL,
    kind             TEXT NOT NULL,
    name             TEXT NOT NULL,
    exported         INTEGER NOT NULL DEFAULT 0,
    visibility       TEXT,
    language         TEXT NOT NULL,
    start_line       INTEGER NOT NULL,
    start_col        INTEGER NOT NULL,
    end_line         INTEGER NOT NULL,
    end_col          INTEGER NOT NULL,
    ast_fingerprint  TEXT NOT NULL,
    signature_json   TEXT,
    summary          TEXT,
    invariants_json  TEXT,
    side_effects_json TEXT,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_symbols_repo_name ON symbols(repo_id, name);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);

CREATE TABLE IF NOT EXISTS edges (
    repo_id             TEXT NOT NULL,
    from_symbol_id      TEXT NOT NULL,
    to_symbol_id        TEXT NOT NULL,
    edge_type           TEXT NOT NULL,
    weight              REAL NOT NULL DEFAULT 1.0,
    confidence          REAL NOT NULL DEFAULT 1.0,
    resolution_strategy TEXT NOT NULL,
    provenance          TEXT,
    created_at          TEXT NOT NULL,
    PRIMARY KEY (repo_id, from_symbol_id, to_symbol_id, edge_type)
);
CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_symbol_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_symbol_id);

CREATE TABLE IF NOT EXISTS metrics (
    symbol_id      TEXT PRIMARY KEY,
    fan_in         INTEGER NOT NULL DEFAULT 0,
    fan_out        INTEGER NOT NULL DEFAULT 0,
    churn30d       INTEGER NOT NULL DEFAULT 0,
    test_refs_json TEXT
);

CREATE TABLE IF NOT EXISTS slice_handles (
    handle         TEXT PRIMARY KEY,
    repo_id        TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    expires_at     TEXT NOT NULL,
    min_version    TEXT,
    max_version    TEXT NOT NULL,
    slice_hash     TEXT NOT NULL,
    members_json   TEXT,
    spillover_json TEXT
);
CREATE INDEX IF NOT EXISTS idx_handles_expiry ON slice_handles(expires_at);
"#;

/// Apply pending migrations. Safe to call on every open.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    let current = read_version(conn)?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    if current < 1 {
        conn.execute_batch(SCHEMA_V1)?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO meta(key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    info!(from = current, to = SCHEMA_VERSION, "schema: migrated");
    Ok(())
}

fn read_version(conn: &Connection) -> Result<i64> {
    let has_meta: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(false);
    if !has_meta {
        return Ok(0);
    }
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |r| r.get(0),
        )
        .ok();
    Ok(v.and_then(|s| s.parse().ok()).unwrap_or(0))
}
