use crate::errors::Result;
use crate::rows::SymbolRow;
use crate::store::{self, Store, WRITE_BATCH};
use rusqlite::OptionalExtension;

impl Store {
    pub fn upsert_symbol(&self, symbol: &SymbolRow) -> Result<()> {
        self.with_tx(|tx| store::upsert_symbol_tx(tx, symbol))
    }

    pub fn get_symbol(&self, symbol_id: &str) -> Result<Option<SymbolRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM symbols WHERE symbol_id = ?1")?;
            Ok(stmt
                .query_row([symbol_id], SymbolRow::from_row)
                .optional()?)
        })
    }

    /// Fetch a batch of symbols; missing IDs are silently absent from the
    /// result. Order follows the input order.
    pub fn get_symbols_by_ids(&self, ids: &[String]) -> Result<Vec<SymbolRow>> {
        self.with_conn(|conn| {
            let mut found = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(WRITE_BATCH) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql =
                    format!("SELECT * FROM symbols WHERE symbol_id IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(chunk.iter()), SymbolRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                found.extend(rows);
            }
            // Preserve request order for deterministic downstream encoding.
            let mut by_id: std::collections::HashMap<String, SymbolRow> = found
                .into_iter()
                .map(|s| (s.symbol_id.clone(), s))
                .collect();
            Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
        })
    }

    pub fn get_symbols_by_file(&self, file_id: &str) -> Result<Vec<SymbolRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM symbols WHERE file_id = ?1 ORDER BY start_line, symbol_id",
            )?;
            Ok(stmt
                .query_map([file_id], SymbolRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn get_symbols_by_repo(&self, repo_id: &str) -> Result<Vec<SymbolRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM symbols WHERE repo_id = ?1 ORDER BY symbol_id")?;
            Ok(stmt
                .query_map([repo_id], SymbolRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Exact-name lookup, ordered by symbol ID for determinism.
    pub fn get_symbols_by_name(&self, repo_id: &str, name: &str) -> Result<Vec<SymbolRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM symbols WHERE repo_id = ?1 AND name = ?2 ORDER BY symbol_id",
            )?;
            Ok(stmt
                .query_map([repo_id, name], SymbolRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Prefix-then-substring search with a deterministic tie-break by name
    /// then symbol ID.
    pub fn search_symbols(&self, repo_id: &str, query: &str, limit: usize) -> Result<Vec<SymbolRow>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT *, CASE WHEN name LIKE ?2 || '%' THEN 0 ELSE 1 END AS match_rank
                 FROM symbols
                 WHERE repo_id = ?1 AND name LIKE '%' || ?2 || '%'
                 ORDER BY match_rank, name, symbol_id
                 LIMIT ?3",
            )?;
            Ok(stmt
                .query_map(
                    rusqlite::params![repo_id, trimmed, limit as i64],
                    SymbolRow::from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn delete_symbols_not_in_file(&self, file_id: &str, keep_ids: &[String]) -> Result<usize> {
        self.with_tx(|tx| {
            let existing: Vec<String> = {
                let mut stmt =
                    tx.prepare_cached("SELECT symbol_id FROM symbols WHERE file_id = ?1")?;
                stmt.query_map([file_id], |r| r.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            let mut deleted = 0usize;
            for id in existing.iter().filter(|id| !keep_ids.contains(id)) {
                tx.execute("DELETE FROM symbols WHERE symbol_id = ?1", [id])?;
                tx.execute(
                    "DELETE FROM edges WHERE from_symbol_id = ?1 OR to_symbol_id = ?1",
                    [id],
                )?;
                tx.execute("DELETE FROM metrics WHERE symbol_id = ?1", [id])?;
                deleted += 1;
            }
            Ok(deleted)
        })
    }
}
