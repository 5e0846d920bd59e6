//! Connection handling and the atomic index-run commit.
//!
//! One `Store` per database path, WAL journaling, `synchronous=NORMAL`,
//! bounded-backoff retry on busy writers. Everything that mutates graph
//! state for an indexing run goes through [`Store::commit_index_run`], which
//! writes the version row last so readers flip between complete snapshots.

use crate::errors::{Error, Result};
use crate::rows::{EdgeRow, FileRow, SymbolRow, VersionRow};
use crate::schema;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rows per statement batch during indexing writes.
pub(crate) const WRITE_BATCH: usize = 500;

const BUSY_RETRIES: u32 = 5;
const BUSY_BACKOFF_MS: u64 = 40;
const STMT_CACHE_CAPACITY: usize = 64;

pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the ledger database at `path` and apply
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, path.to_path_buf())
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        conn.busy_timeout(Duration::from_millis(250))?;
        conn.set_prepared_statement_cache_capacity(STMT_CACHE_CAPACITY);

        schema::migrate(&conn)?;
        info!(path = %path.display(), "store: opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only closure against the shared connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction, retrying bounded times on busy/locked.
    /// Aborted transactions leave no partial visibility.
    pub(crate) fn with_tx<T>(&self, f: impl Fn(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            let result: Result<T> = (|| {
                let mut conn = self.conn.lock();
                let tx = conn.transaction()?;
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            })();
            match result {
                Ok(v) => return Ok(v),
                Err(e) if e.is_busy() && attempt < BUSY_RETRIES => {
                    attempt += 1;
                    let delay = Duration::from_millis(BUSY_BACKOFF_MS * u64::from(attempt));
                    warn!(attempt, ?delay, "store: busy, retrying transaction");
                    std::thread::sleep(delay);
                }
                Err(e) if e.is_busy() => return Err(Error::Busy(attempt)),
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) fn now_iso() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

/// Everything an indexing run wants to persist, committed atomically.
///
/// `symbols` carries a full per-file rewrite: stale symbol rows for those
/// files are deleted in the same transaction. The version row goes in last.
#[derive(Debug, Default)]
pub struct IndexCommit {
    pub repo_id: String,
    pub version: Option<VersionRow>,
    /// Every file seen this run, unchanged ones included (their
    /// `last_seen_version` is bumped so pruning spares them).
    pub files: Vec<FileRow>,
    /// `(file_id, symbols)` for each re-parsed file.
    pub symbols: Vec<(String, Vec<SymbolRow>)>,
    /// Symbols whose previously stored outgoing edges must be dropped before
    /// the new edge set is written.
    pub purge_edges_from: Vec<String>,
    pub edges: Vec<EdgeRow>,
}

impl Store {
    /// Atomically apply an index run: file upserts, per-file symbol rewrites,
    /// edge rewrites, metric refresh, pruning of vanished files, and finally
    /// the new version row.
    pub fn commit_index_run(&self, commit: &IndexCommit) -> Result<()> {
        let version = commit
            .version
            .as_ref()
            .ok_or_else(|| Error::Corruption("index commit without a version row".into()))?;

        self.with_tx(|tx| {
            for chunk in commit.files.chunks(WRITE_BATCH) {
                for file in chunk {
                    upsert_file_tx(tx, file)?;
                }
            }

            let mut rewritten = 0usize;
            for (file_id, symbols) in &commit.symbols {
                delete_symbols_not_in_tx(tx, file_id, symbols)?;
                for chunk in symbols.chunks(WRITE_BATCH) {
                    for s in chunk {
                        upsert_symbol_tx(tx, s)?;
                        rewritten += 1;
                    }
                }
            }

            for chunk in commit.purge_edges_from.chunks(WRITE_BATCH) {
                for from in chunk {
                    tx.execute("DELETE FROM edges WHERE from_symbol_id = ?1", [from])?;
                }
            }
            for chunk in commit.edges.chunks(WRITE_BATCH) {
                for e in chunk {
                    upsert_edge_tx(tx, e)?;
                }
            }

            prune_missing_files_tx(tx, &commit.repo_id, &version.version_id)?;
            refresh_metrics_tx(tx, &commit.repo_id, &commit.symbols)?;

            tx.execute(
                "INSERT INTO versions(version_id, repo_id, created_at, parent)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    version.version_id,
                    version.repo_id,
                    version.created_at,
                    version.parent
                ],
            )?;

            debug!(
                repo = %commit.repo_id,
                version = %version.version_id,
                files = commit.files.len(),
                symbols = rewritten,
                edges = commit.edges.len(),
                "store: index run committed"
            );
            Ok(())
        })
    }
}

pub(crate) fn upsert_file_tx(tx: &Transaction<'_>, file: &FileRow) -> Result<()> {
    // file_id is derived from (repo, rel_path), so the PK and the unique
    // constraint collide together; OR REPLACE settles both.
    tx.execute(
        "INSERT OR REPLACE INTO files(file_id, repo_id, rel_path, content_hash, language, bytes, last_seen_version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            file.file_id,
            file.repo_id,
            file.rel_path,
            file.content_hash,
            file.language,
            file.bytes,
            file.last_seen_version
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_symbol_tx(tx: &Transaction<'_>, s: &SymbolRow) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO symbols(
             symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
             start_line, start_col, end_line, end_col,
             ast_fingerprint, signature_json, summary, invariants_json, side_effects_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            s.symbol_id,
            s.repo_id,
            s.file_id,
            s.kind.as_str(),
            s.name,
            s.exported,
            s.visibility.map(|v| v.as_str()),
            s.language,
            s.range.start_line,
            s.range.start_col,
            s.range.end_line,
            s.range.end_col,
            s.ast_fingerprint,
            s.signature_json,
            s.summary,
            s.invariants_json,
            s.side_effects_json,
            s.updated_at
        ],
    )?;
    Ok(())
}

pub(crate) fn upsert_edge_tx(tx: &Transaction<'_>, e: &EdgeRow) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO edges(
             repo_id, from_symbol_id, to_symbol_id, edge_type,
             weight, confidence, resolution_strategy, provenance, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            e.repo_id,
            e.from_symbol_id,
            e.to_symbol_id,
            e.edge_type.as_str(),
            e.weight,
            e.confidence,
            e.resolution_strategy.as_str(),
            e.provenance,
            e.created_at
        ],
    )?;
    Ok(())
}

fn delete_symbols_not_in_tx(
    tx: &Transaction<'_>,
    file_id: &str,
    keep: &[SymbolRow],
) -> Result<()> {
    // Stale rows for a rewritten file go away together with their edges and
    // metrics, in the same transaction that writes the replacements.
    let keep_ids: Vec<&str> = keep.iter().map(|s| s.symbol_id.as_str()).collect();
    let stale: Vec<String> = {
        let mut stmt = tx.prepare_cached("SELECT symbol_id FROM symbols WHERE file_id = ?1")?;
        let found = stmt
            .query_map([file_id], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        found
            .into_iter()
            .filter(|id| !keep_ids.contains(&id.as_str()))
            .collect()
    };
    for id in &stale {
        tx.execute("DELETE FROM symbols WHERE symbol_id = ?1", [id])?;
        tx.execute(
            "DELETE FROM edges WHERE from_symbol_id = ?1 OR to_symbol_id = ?1",
            [id],
        )?;
        tx.execute("DELETE FROM metrics WHERE symbol_id = ?1", [id])?;
    }
    Ok(())
}

fn prune_missing_files_tx(tx: &Transaction<'_>, repo_id: &str, version_id: &str) -> Result<()> {
    let gone: Vec<String> = {
        let mut stmt = tx.prepare_cached(
            "SELECT file_id FROM files WHERE repo_id = ?1 AND last_seen_version < ?2",
        )?;
        stmt.query_map(params![repo_id, version_id], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
    };
    for file_id in &gone {
        let ids: Vec<String> = {
            let mut stmt = tx.prepare_cached("SELECT symbol_id FROM symbols WHERE file_id = ?1")?;
            stmt.query_map([file_id], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for id in &ids {
            tx.execute(
                "DELETE FROM edges WHERE from_symbol_id = ?1 OR to_symbol_id = ?1",
                [id],
            )?;
            tx.execute("DELETE FROM metrics WHERE symbol_id = ?1", [id])?;
        }
        tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM files WHERE file_id = ?1", [file_id])?;
    }
    if !gone.is_empty() {
        debug!(repo = repo_id, pruned = gone.len(), "store: pruned vanished files");
    }
    Ok(())
}

fn refresh_metrics_tx(
    tx: &Transaction<'_>,
    repo_id: &str,
    rewritten: &[(String, Vec<SymbolRow>)],
) -> Result<()> {
    for (_, symbols) in rewritten {
        for s in symbols {
            tx.execute(
                "INSERT OR IGNORE INTO metrics(symbol_id, fan_in, fan_out, churn30d) VALUES (?1, 0, 0, 0)",
                [&s.symbol_id],
            )?;
            tx.execute(
                "UPDATE metrics SET churn30d = churn30d + 1 WHERE symbol_id = ?1",
                [&s.symbol_id],
            )?;
        }
    }
    tx.execute(
        "UPDATE metrics SET
             fan_in = (SELECT COUNT(*) FROM edges WHERE to_symbol_id = metrics.symbol_id),
             fan_out = (SELECT COUNT(*) FROM edges WHERE from_symbol_id = metrics.symbol_id)
         WHERE symbol_id IN (SELECT symbol_id FROM symbols WHERE repo_id = ?1)",
        [repo_id],
    )?;
    Ok(())
}
