use crate::errors::Result;
use crate::rows::EdgeRow;
use crate::store::{self, Store, WRITE_BATCH};

impl Store {
    pub fn upsert_edge(&self, edge: &EdgeRow) -> Result<()> {
        self.with_tx(|tx| store::upsert_edge_tx(tx, edge))
    }

    pub fn get_edges_from(&self, symbol_id: &str) -> Result<Vec<EdgeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM edges WHERE from_symbol_id = ?1
                 ORDER BY to_symbol_id, edge_type",
            )?;
            Ok(stmt
                .query_map([symbol_id], EdgeRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn get_edges_to(&self, symbol_id: &str) -> Result<Vec<EdgeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM edges WHERE to_symbol_id = ?1
                 ORDER BY from_symbol_id, edge_type",
            )?;
            Ok(stmt
                .query_map([symbol_id], EdgeRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Outgoing edges for a batch of symbols, one sweep per chunk. Used by
    /// the slice loader to hydrate adjacency without per-symbol queries.
    pub fn get_edges_from_symbols(&self, ids: &[String]) -> Result<Vec<EdgeRow>> {
        self.with_conn(|conn| {
            let mut out = Vec::new();
            for chunk in ids.chunks(WRITE_BATCH) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql = format!(
                    "SELECT * FROM edges WHERE from_symbol_id IN ({placeholders})
                     ORDER BY from_symbol_id, to_symbol_id, edge_type"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(chunk.iter()), EdgeRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                out.extend(rows);
            }
            Ok(out)
        })
    }

    pub fn get_edges_by_repo(&self, repo_id: &str) -> Result<Vec<EdgeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM edges WHERE repo_id = ?1
                 ORDER BY from_symbol_id, to_symbol_id, edge_type",
            )?;
            Ok(stmt
                .query_map([repo_id], EdgeRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn delete_edges_from_symbols(&self, symbol_ids: &[String]) -> Result<usize> {
        self.with_tx(|tx| {
            let mut deleted = 0usize;
            for chunk in symbol_ids.chunks(WRITE_BATCH) {
                for id in chunk {
                    deleted += tx.execute("DELETE FROM edges WHERE from_symbol_id = ?1", [id])?;
                }
            }
            Ok(deleted)
        })
    }
}
