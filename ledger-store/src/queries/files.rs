use crate::errors::Result;
use crate::rows::FileRow;
use crate::store::{self, Store};
use rusqlite::OptionalExtension;
use std::collections::HashMap;

impl Store {
    pub fn upsert_file(&self, file: &FileRow) -> Result<()> {
        self.with_tx(|tx| store::upsert_file_tx(tx, file))
    }

    pub fn get_file_by_id(&self, file_id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM files WHERE file_id = ?1")?;
            Ok(stmt.query_row([file_id], FileRow::from_row).optional()?)
        })
    }

    pub fn get_file(&self, repo_id: &str, rel_path: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM files WHERE repo_id = ?1 AND rel_path = ?2")?;
            Ok(stmt
                .query_row([repo_id, rel_path], FileRow::from_row)
                .optional()?)
        })
    }

    /// All file rows of a repo keyed by relative path; the indexer uses this
    /// to decide per-file whether re-parsing is needed.
    pub fn files_by_rel_path(&self, repo_id: &str) -> Result<HashMap<String, FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM files WHERE repo_id = ?1")?;
            let rows = stmt
                .query_map([repo_id], FileRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows.into_iter().map(|f| (f.rel_path.clone(), f)).collect())
        })
    }

    pub fn get_files(&self, repo_id: &str) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT * FROM files WHERE repo_id = ?1 ORDER BY rel_path")?;
            Ok(stmt
                .query_map([repo_id], FileRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn count_symbols(&self, repo_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT COUNT(*) FROM symbols WHERE repo_id = ?1")?;
            Ok(stmt.query_row([repo_id], |r| r.get::<_, i64>(0))? as u64)
        })
    }
}
